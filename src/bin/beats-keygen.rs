/// Beats Keypair Generator
///
/// Generates a fresh Ed25519 writer keypair for the anchor service and
/// prints the base58 forms an operator needs:
///
///   BEATS_ANCHOR_KEYPAIR  - the 64-byte secret (seed || public key)
///   writer address        - fund this account before going live
///
/// The secret is printed once and never written to disk.
use beats_core::signer::Keychain;
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use rand_core::RngCore;

fn main() {
    let mut rng = OsRng;
    let mut seed = [0u8; 32];
    rng.fill_bytes(&mut seed);
    let signing_key = SigningKey::from_bytes(&seed);

    let mut full = Vec::with_capacity(64);
    full.extend_from_slice(&seed);
    full.extend_from_slice(&signing_key.verifying_key().to_bytes());

    let keys = Keychain::from_master_seed(&seed);

    println!("BEATS_ANCHOR_KEYPAIR={}", bs58::encode(&full).into_string());
    println!();
    println!("writer address:        {}", keys.writer_address);
    println!("timestamp receipt key: {}", keys.timestamp.public_key_base58());
    println!("work-proof key:        {}", keys.work_proof.public_key_base58());
    println!();
    println!("Fund the writer address, export BEATS_ANCHOR_KEYPAIR, and start beats.");
}
