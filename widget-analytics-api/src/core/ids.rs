use chrono::Utc;
use rand::Rng;

const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const RANDOM_SUFFIX_LEN: usize = 11;

/// Record id: base-36 epoch milliseconds followed by a random base-36 suffix.
///
/// Ids are display keys only. Uniqueness is best-effort.
pub fn generate_id() -> String {
    let millis = u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default();
    let mut id = to_base36(millis);

    let mut rng = rand::thread_rng();
    id.extend((0..RANDOM_SUFFIX_LEN).map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char));
    id
}

fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }

    let mut digits = Vec::new();
    while value > 0 {
        digits.push(ALPHABET[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}
