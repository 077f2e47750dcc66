//! secp256k1 Key Generation Utility
//!
//! Generates a new signing key for one of the bootstrap roles (side chain
//! admin, relay operator, relay validator).
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin generate_keys
//! ```
//!
//! Export the private key under the environment variable the config names
//! for that role.

use bridge_bootstrap::crypto::Credential;
use rand::Rng;

fn main() -> anyhow::Result<()> {
    let mut rng = rand::rngs::OsRng;
    // Retry on an out-of-range scalar
    let credential = loop {
        let mut secret = [0u8; 32];
        rng.fill(&mut secret);
        if let Ok(credential) = Credential::from_bytes(&secret) {
            println!("Generated secp256k1 Key:");
            println!("Private Key (hex): 0x{}", hex::encode(secret));
            break credential;
        }
    };

    println!("Public Key (uncompressed): 0x{}", hex::encode(credential.public_key_uncompressed()));
    println!("Address: {:?}", credential.address());
    println!();
    println!("Export the private key under the variable named in config/bridge-bootstrap.toml.");
    Ok(())
}
