/// One-way password hashing capability.
pub trait PasswordEncoder: Send + Sync {
    fn encode(&self, raw: &str) -> anyhow::Result<String>;

    /// False for mismatches and for unparseable hashes alike.
    fn verify(&self, raw: &str, hash: &str) -> bool;
}

#[derive(Debug, Clone, Copy)]
pub struct BcryptPasswordEncoder {
    cost: u32,
}

impl BcryptPasswordEncoder {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }
}

impl PasswordEncoder for BcryptPasswordEncoder {
    fn encode(&self, raw: &str) -> anyhow::Result<String> {
        Ok(bcrypt::hash(raw, self.cost)?)
    }

    fn verify(&self, raw: &str, hash: &str) -> bool {
        bcrypt::verify(raw, hash).unwrap_or(false)
    }
}
