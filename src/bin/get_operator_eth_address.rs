//! Print Bootstrap Signer Addresses
//!
//! Reads the bootstrap configuration and prints the EVM address of every
//! configured signing key, so the accounts can be funded and, for relay
//! validators, checked against the relay chain's validator list.

use anyhow::Result;
use bridge_bootstrap::config::Config;
use bridge_bootstrap::crypto::Credential;

fn print_address(role: &str, key: Result<String>) {
    match key.and_then(|k| Credential::from_hex(&k)) {
        Ok(credential) => println!("{}: {:?}", role, credential.address()),
        Err(e) => println!("{}: unavailable ({})", role, e),
    }
}

fn main() -> Result<()> {
    let config = Config::load()?;

    print_address("side chain admin", config.side_chain.get_private_key());
    print_address("relay operator", config.relay_chain.get_operator_private_key());
    for index in 0..config.relay_chain.validator_private_key_envs.len() {
        print_address(
            &format!("relay validator {}", index),
            config.relay_chain.get_validator_private_key(index),
        );
    }

    Ok(())
}
