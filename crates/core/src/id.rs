//! Short id generation over fixed alphabets.

use rand::Rng;

/// User key alphabet: 57 characters, excludes the visually ambiguous
/// `0`, `O`, `I` and `l`.
pub const USER_ALPHABET: &[u8] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Upload id alphabet: the 62 alphanumerics.
pub const UPLOAD_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

fn sample(alphabet: &[u8], len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| alphabet[rng.gen_range(0..alphabet.len())] as char)
        .collect()
}

/// Generate a fresh 16-character user key.
///
/// Collisions against existing state are the caller's concern: the state
/// owner retries until the key is not present in `users`.
pub fn new_user_key() -> String {
    sample(USER_ALPHABET, crate::USER_KEY_LEN)
}

/// Generate a fresh 20-character upload id.
pub fn new_upload_id() -> String {
    sample(UPLOAD_ALPHABET, crate::UPLOAD_ID_LEN)
}
