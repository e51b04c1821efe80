/// A running marble activation. Identity is the UUID, not the name —
/// two instances of the same marble carry distinct UUIDs.
#[derive(Debug, Clone)]
pub struct MarbleInstance {
    pub name: String,
    pub uuid: String,
    pub activated_at: std::time::SystemTime,
    pub quote: Vec<u8>,
}
