//! # Conversation Demo
//!
//! Two users register, share a conversation, and exchange messages. The
//! directory only ever sees public keys, vault-wrapped private keys, and
//! ciphertext.
//!
//! ## Run
//!
//! ```bash
//! RUST_LOG=parley_core=debug cargo run --example conversation_demo
//! ```

use parley_core::time::format_millis;
use parley_core::{AccountService, InMemoryDirectory, SecureStore, Session};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parley_core=info".into()),
        )
        .init();

    println!("=== Parley Core: Conversation Demo ===\n");

    let directory = InMemoryDirectory::new();
    let alice_device = SecureStore::new();
    let bob_device = SecureStore::new();

    // Step 1: Registration
    println!("Step 1: Registering Alice and Bob (RSA-2048, PBKDF2 100k rounds)...");

    let (alice, request) = Session::register(&alice_device, "alice", "alice-password")?;
    directory.register(request).await?;
    let (bob, request) = Session::register(&bob_device, "bob", "bob-password")?;
    directory.register(request).await?;

    println!(
        "  Alice's key fingerprint: {}",
        alice.identity().public_key().fingerprint()
    );
    println!(
        "  Bob's key fingerprint:   {}",
        bob.identity().public_key().fingerprint()
    );
    if let Some(created) = format_millis(alice.identity().created_at() * 1000) {
        println!("  Identities created at:   {}", created);
    }
    println!();

    // Step 2: Conversation setup
    println!("Step 2: Alice creates a conversation with Bob...");

    let record = alice
        .create_conversation(&directory, &["bob".to_string()])
        .await?;

    println!("  Conversation id: {}", record.id);
    for (username, participant) in &record.participants {
        println!(
            "  {:>5}: wrapped key {}...",
            username,
            &participant.encrypted_symmetric_key[..24]
        );
    }
    println!();

    // Step 3: Messages
    println!("Step 3: Exchanging messages...");

    let message = alice.encrypt_message(&record.id, "bob", "Hi Bob, lunch at noon?")?;
    println!("  Alice sends: {}...", &message.content[..32]);
    if let Some(sent) = message.timestamp.and_then(format_millis) {
        println!("  Sent at:     {}", sent);
    }

    let published = directory
        .conversation(&record.id)
        .ok_or("conversation disappeared")?;
    bob.open_conversation(&published)?;
    println!("  Bob reads:   {}", bob.decrypt_message(&message)?);
    directory.deliver(message)?;

    let reply = bob.encrypt_message(&record.id, "alice", "Sounds good!")?;
    println!("  Alice reads: {}", alice.decrypt_message(&reply)?);
    directory.deliver(reply)?;
    println!();

    // Step 4: Logging in again
    println!("Step 4: Logging out and back in...");

    println!("  Alice dropped {} conversation key(s)", alice.logout());

    match Session::login(&alice_device, "alice", "wrong-password") {
        Ok(_) => println!("  Unexpected: wrong password accepted"),
        Err(e) => println!("  Wrong password: {}", e.user_message()),
    }

    let alice =
        Session::login_remote(&directory, &alice_device, "alice", "alice-password").await?;
    for record in alice.conversations(&directory).await? {
        for (frame, text) in alice.decrypt_history(&record)? {
            println!("  History {:>5}: {}", frame.from, text);
        }
    }

    bob.logout();
    alice.logout();

    println!("\n=== Demo Complete ===");
    Ok(())
}
