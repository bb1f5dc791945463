mod logger;

pub use logger::Logger;

pub fn create_buffer(size: usize) -> Vec<u8> {
    vec![0u8; size]
}
