//! Parley key tool.
//!
//! Operates directly on an installation's durable key store.
//!
//! # Usage
//!
//! ```bash
//! # Initial key two participants would derive for a new conversation
//! parley-keytool room-key alice bob
//!
//! # Resolve (and persist) the key of a conversation
//! parley-keytool --store keys.redb resolve room-42
//!
//! # Round-trip a body
//! parley-keytool --store keys.redb encrypt room-42 "hello"
//! parley-keytool --store keys.redb decrypt room-42 <ciphertext> --tag <tag>
//!
//! # Move keys to another installation
//! parley-keytool --store keys.redb backup alice keys.cbor
//! parley-keytool --store other.redb restore alice keys.cbor
//! ```

use std::{
    error::Error,
    fs::File,
    io::{self, BufReader, BufWriter, Write},
    path::PathBuf,
};

use clap::{Parser, Subcommand, ValueEnum};
use parley_client::{
    ConversationId, Environment, KeyBackup, KeyResolver, ResolverConfig, SystemEnv, UserId,
};
use parley_crypto::{Cipher, SealedCipher, XorCipher};
use parley_store::RedbKeyStore;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Parley key tool
#[derive(Parser, Debug)]
#[command(name = "parley-keytool")]
#[command(about = "Inspect and manage Parley conversation keys")]
#[command(version)]
struct Args {
    /// Path to the key store database
    #[arg(short, long, default_value = "parley-keys.redb")]
    store: PathBuf,

    /// Body cipher for encrypt/decrypt
    #[arg(long, value_enum, default_value_t = CipherKind::Xor)]
    cipher: CipherKind,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CipherKind {
    /// Legacy XOR keystream
    Xor,
    /// XChaCha20-Poly1305
    Sealed,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Print the initial key for a two-party conversation
    RoomKey {
        /// First participant
        a: String,
        /// Second participant
        b: String,
    },

    /// Resolve a conversation key, deriving and storing one if missing
    Resolve {
        /// Conversation id
        conversation: String,
    },

    /// Set up the key of a new two-party conversation
    InitConversation {
        /// Conversation id
        conversation: String,
        /// First participant
        a: String,
        /// Second participant
        b: String,
    },

    /// Generate the user's key unless one exists
    InitUser {
        /// User id
        user: String,
    },

    /// Encrypt a body under the conversation key
    Encrypt {
        /// Conversation id
        conversation: String,
        /// Plaintext
        text: String,
    },

    /// Recover a body, falling back the way a client would
    Decrypt {
        /// Conversation id
        conversation: String,
        /// Stored body
        ciphertext: String,
        /// Integrity tag stored with the body
        #[arg(long)]
        tag: Option<String>,
    },

    /// Export the user key and all conversation keys as CBOR
    Backup {
        /// User id
        user: String,
        /// Output file
        file: PathBuf,
    },

    /// Import keys from a CBOR backup
    Restore {
        /// User id
        user: String,
        /// Backup file
        file: PathBuf,
    },

    /// Remove every stored key
    Clear,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer().with_writer(io::stderr)).with(filter).init();

    let store = RedbKeyStore::open(&args.store)?;
    tracing::debug!(store = %args.store.display(), cipher = ?args.cipher, "opened key store");

    let mut out = io::stdout().lock();
    match args.cipher {
        CipherKind::Xor => run(args.command, &resolver(store, XorCipher), &SystemEnv, &mut out),
        CipherKind::Sealed => {
            run(args.command, &resolver(store, SealedCipher), &SystemEnv, &mut out)
        },
    }
}

fn resolver<C: Cipher>(store: RedbKeyStore, cipher: C) -> KeyResolver<RedbKeyStore, C> {
    KeyResolver::new(store, cipher, ResolverConfig::default())
}

fn run<C, E, W>(
    command: Command,
    keys: &KeyResolver<RedbKeyStore, C>,
    env: &E,
    out: &mut W,
) -> Result<(), Box<dyn Error>>
where
    C: Cipher,
    E: Environment,
    W: Write,
{
    match command {
        Command::RoomKey { a, b } => {
            let (a, b) = (UserId::new(a), UserId::new(b));
            let key = KeyResolver::<RedbKeyStore, C>::derive_room_key(&a, &b);
            writeln!(out, "{}", key.as_str())?;
        },
        Command::Resolve { conversation } => {
            let resolved = keys.resolve_with_source(&ConversationId::new(conversation), None)?;
            writeln!(out, "{}\t{:?}", resolved.key.as_str(), resolved.source)?;
        },
        Command::InitConversation { conversation, a, b } => {
            let key = keys.initialize_conversation(
                &ConversationId::new(conversation),
                &UserId::new(a),
                &UserId::new(b),
            )?;
            writeln!(out, "{}", key.as_str())?;
        },
        Command::InitUser { user } => {
            let key = keys.initialize_user_key(&UserId::new(user), env.random_seed())?;
            writeln!(out, "{}", key.as_str())?;
        },
        Command::Encrypt { conversation, text } => {
            let key = keys.resolve(&ConversationId::new(conversation), None)?;
            let sealed = keys.seal(&key, &text)?;
            writeln!(out, "{}\t{}", sealed.ciphertext, sealed.tag)?;
        },
        Command::Decrypt { conversation, ciphertext, tag } => {
            let conversation = ConversationId::new(conversation);
            let opened = keys.open_message(&conversation, &ciphertext, tag.as_deref())?;
            tracing::info!(recovery = ?opened.recovery, "opened body");
            writeln!(out, "{}", opened.content)?;
        },
        Command::Backup { user, file } => {
            let backup = keys.backup_keys(&UserId::new(user))?;
            let mut writer = BufWriter::new(File::create(&file)?);
            ciborium::into_writer(&backup, &mut writer)?;
            writer.flush()?;
            writeln!(out, "{} conversation keys", backup.conversation_keys.len())?;
        },
        Command::Restore { user, file } => {
            let backup: KeyBackup = ciborium::from_reader(BufReader::new(File::open(&file)?))?;
            keys.restore_keys(&UserId::new(user), &backup)?;
            writeln!(out, "{} conversation keys", backup.conversation_keys.len())?;
        },
        Command::Clear => {
            let removed = keys.clear_all_keys()?;
            writeln!(out, "{removed} keys removed")?;
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use parley_client::ManualEnv;
    use tempfile::TempDir;

    use super::*;

    fn exec<C: Cipher>(keys: &KeyResolver<RedbKeyStore, C>, argv: &[&str]) -> String {
        let args =
            Args::try_parse_from(std::iter::once("parley-keytool").chain(argv.iter().copied()))
                .unwrap();
        let mut out = Vec::new();
        run(args.command, keys, &ManualEnv::new(0, 3), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn store(dir: &TempDir, name: &str) -> RedbKeyStore {
        RedbKeyStore::open(dir.path().join(name)).unwrap()
    }

    #[test]
    fn parses_global_options() {
        let args = Args::try_parse_from([
            "parley-keytool",
            "--store",
            "k.redb",
            "--cipher",
            "sealed",
            "resolve",
            "r1",
        ])
        .unwrap();

        assert_eq!(args.store, PathBuf::from("k.redb"));
        assert_eq!(args.cipher, CipherKind::Sealed);
        assert_eq!(args.command, Command::Resolve { conversation: "r1".into() });
    }

    #[test]
    fn room_key_ignores_participant_order() {
        let dir = TempDir::new().unwrap();
        let keys = resolver(store(&dir, "k.redb"), XorCipher);

        assert_eq!(
            exec(&keys, &["room-key", "alice", "bob"]),
            exec(&keys, &["room-key", "bob", "alice"])
        );
    }

    #[test]
    fn resolve_reports_strategy() {
        let dir = TempDir::new().unwrap();
        let keys = resolver(store(&dir, "k.redb"), XorCipher);

        assert!(exec(&keys, &["resolve", "r2"]).trim_end().ends_with("RoomFallback"));
        assert!(exec(&keys, &["resolve", "r2"]).trim_end().ends_with("Stored"));
    }

    #[test]
    fn encrypt_then_decrypt() {
        let dir = TempDir::new().unwrap();
        let keys = resolver(store(&dir, "k.redb"), SealedCipher);

        let sealed = exec(&keys, &["encrypt", "r1", "hello there"]);
        let (ciphertext, tag) = sealed.trim_end().split_once('\t').unwrap();

        let opened = exec(&keys, &["decrypt", "r1", ciphertext, "--tag", tag]);
        assert_eq!(opened, "hello there\n");
    }

    #[test]
    fn backup_and_restore_through_file() {
        let dir = TempDir::new().unwrap();
        let backup = dir.path().join("keys.cbor");
        let backup = backup.to_str().unwrap();

        let source = resolver(store(&dir, "a.redb"), XorCipher);
        exec(&source, &["init-user", "u1"]);
        let key = exec(&source, &["init-conversation", "r1", "u1", "u2"]);
        assert_eq!(exec(&source, &["backup", "u1", backup]), "1 conversation keys\n");

        let target = resolver(store(&dir, "b.redb"), XorCipher);
        assert_eq!(exec(&target, &["restore", "u1", backup]), "1 conversation keys\n");
        assert_eq!(exec(&target, &["init-conversation", "r1", "x", "y"]), key);

        assert_eq!(exec(&target, &["clear"]), "2 keys removed\n");
    }
}
