
use bytemuck::pod_collect_to_vec;

// Images are stored as little-endian 16-bit words.
pub fn words_from_bytes(input: &[u8]) -> Option<Vec<u16>> {
    if input.len() % 2 != 0 {
        return None;
    }
    let words: Vec<u16> = pod_collect_to_vec(input);
    Some(words.into_iter().map(u16::from_le).collect())
}

pub fn bytes_from_words(input: &[u16]) -> Vec<u8> {
    input.iter().flat_map(|w| w.to_le_bytes()).collect()
}
