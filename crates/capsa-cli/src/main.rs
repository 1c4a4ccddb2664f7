use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use capsa_core::builder::{CapsaBuilder, FileOptions, PartyKey};
use capsa_core::keys::{parse_private_key, parse_public_key};
use capsa_core::limits::Limits;
use capsa_core::opener::OpenedCapsa;
use capsa_core::{generate_key_pair, Capsa};
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about = "capsa: build and open zero-knowledge capsa envelopes")]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Generate an RSA-4096 key pair
    Keygen {
        /// Output directory (default: $HOME/.capsa)
        #[arg(short, long)]
        outdir: Option<String>,
    },
    /// Build a capsa envelope from a subject/body and local files
    Build {
        /// This party's id, used as the keychain's creator entry
        #[arg(long)]
        creator_id: String,
        /// Path to the creator's PKCS#8 private key PEM
        #[arg(long)]
        creator_key: String,
        #[arg(long)]
        subject: Option<String>,
        #[arg(long)]
        body: Option<String>,
        /// `id:path-to-spki-pem`, repeatable
        #[arg(long = "recipient", num_args = 1..)]
        recipients: Vec<String>,
        /// Path to a file to attach, repeatable
        #[arg(long = "file", num_args = 1..)]
        files: Vec<String>,
        /// Directory to write envelope.json and the per-file ciphertext blobs into
        #[arg(long)]
        out: String,
    },
    /// Open a previously built capsa envelope
    Open {
        /// Directory produced by `build` (envelope.json + blobs)
        #[arg(long)]
        r#in: String,
        /// Path to the opening party's PKCS#8 private key PEM
        #[arg(long)]
        private_key: String,
        /// Keychain party id to open as (defaults to the first usable entry)
        #[arg(long)]
        party_id: Option<String>,
        /// Path to the creator's SPKI public key PEM, required to verify the signature
        #[arg(long)]
        creator_key: Option<String>,
        /// Directory to write decrypted files into
        #[arg(long)]
        out: String,
    },
}

fn default_keydir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".capsa")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Keygen { outdir } => cmd_keygen(outdir),
        Cmd::Build {
            creator_id,
            creator_key,
            subject,
            body,
            recipients,
            files,
            out,
        } => cmd_build(creator_id, creator_key, subject, body, recipients, files, out),
        Cmd::Open {
            r#in,
            private_key,
            party_id,
            creator_key,
            out,
        } => cmd_open(r#in, private_key, party_id, creator_key, out),
    }
}

fn cmd_keygen(outdir: Option<String>) -> Result<()> {
    let dir = outdir.map(PathBuf::from).unwrap_or_else(default_keydir);
    fs::create_dir_all(&dir)?;
    let pair = generate_key_pair(capsa_core::PRODUCTION_BITS)?;
    fs::write(dir.join("public.pem"), &pair.public_key)?;
    fs::write(dir.join("private.pem"), &pair.private_key)?;
    println!("generated RSA-{} key pair", pair.bits);
    println!("fingerprint: {}", pair.fingerprint);
    println!("public key:  {}", dir.join("public.pem").display());
    println!("private key: {}", dir.join("private.pem").display());
    Ok(())
}

fn parse_recipient(spec: &str) -> Result<(String, String)> {
    let (id, path) = spec
        .split_once(':')
        .with_context(|| format!("recipient spec must be `id:path`, got `{spec}`"))?;
    Ok((id.to_string(), path.to_string()))
}

fn cmd_build(
    creator_id: String,
    creator_key_path: String,
    subject: Option<String>,
    body: Option<String>,
    recipients: Vec<String>,
    files: Vec<String>,
    out: String,
) -> Result<()> {
    let creator_key_pem = fs::read_to_string(&creator_key_path)
        .with_context(|| format!("reading creator private key at {creator_key_path}"))?;
    let creator_sk = parse_private_key(&creator_key_pem)?;
    let creator_pk = rsa::RsaPublicKey::from(&creator_sk);
    let creator_fingerprint = capsa_core::keys::fingerprint(&creator_pk)?;

    let mut party_keys = vec![PartyKey {
        id: creator_id.clone(),
        public_key: creator_pk,
        fingerprint: creator_fingerprint,
        is_delegate: None,
    }];

    let mut builder = CapsaBuilder::new(creator_id.clone(), Limits::default());
    if let Some(s) = subject {
        builder.set_subject(s)?;
    }
    if let Some(b) = body {
        builder.set_body(b)?;
    }

    for spec in &recipients {
        let (id, path) = parse_recipient(spec)?;
        let pem = fs::read_to_string(&path).with_context(|| format!("reading recipient key at {path}"))?;
        let pk = parse_public_key(&pem)?;
        let fingerprint = capsa_core::keys::fingerprint(&pk)?;
        builder.add_recipient(id.clone())?;
        party_keys.push(PartyKey {
            id,
            public_key: pk,
            fingerprint,
            is_delegate: None,
        });
    }

    for path in &files {
        builder.add_file_path(Path::new(path), FileOptions::default())?;
    }

    let built = builder.build(&creator_sk, party_keys)?;

    let out_dir = PathBuf::from(&out);
    fs::create_dir_all(&out_dir)?;
    fs::write(
        out_dir.join("envelope.json"),
        serde_json::to_vec_pretty(&built.envelope)?,
    )?;
    for (file_id, ciphertext) in &built.blobs {
        fs::write(out_dir.join(file_id), ciphertext)?;
    }

    println!("built {} -> {}", built.envelope.package_id, out_dir.display());
    println!("files: {}", built.envelope.files.len());
    Ok(())
}

fn cmd_open(
    in_dir: String,
    private_key_path: String,
    party_id: Option<String>,
    creator_key_path: Option<String>,
    out: String,
) -> Result<()> {
    let in_dir = PathBuf::from(&in_dir);
    let envelope_json = fs::read_to_string(in_dir.join("envelope.json"))
        .with_context(|| format!("reading envelope.json under {}", in_dir.display()))?;
    let envelope: Capsa = serde_json::from_str(&envelope_json)?;

    let private_key_pem = fs::read_to_string(&private_key_path)?;
    let private_key = parse_private_key(&private_key_pem)?;

    let creator_pk = match creator_key_path {
        Some(path) => {
            let pem = fs::read_to_string(&path).with_context(|| format!("reading creator key at {path}"))?;
            Some(parse_public_key(&pem)?)
        }
        None => None,
    };
    let verify_signature = creator_pk.is_some();
    if !verify_signature {
        eprintln!("warning: no --creator-key given, opening without signature verification");
    }

    let opened = OpenedCapsa::open(
        envelope,
        &private_key,
        party_id.as_deref(),
        creator_pk.as_ref(),
        verify_signature,
    )?;

    if let Some(subject) = opened.subject() {
        println!("subject: {subject}");
    }
    if let Some(body) = opened.body() {
        println!("body: {body}");
    }

    let out_dir = PathBuf::from(&out);
    fs::create_dir_all(&out_dir)?;
    for file in opened.files() {
        let ciphertext_path = in_dir.join(&file.file_id);
        let ciphertext = fs::read(&ciphertext_path)
            .with_context(|| format!("reading blob {}", ciphertext_path.display()))?;
        let filename = opened.decrypt_filename(&file.file_id)?;
        let plaintext = opened.decrypt_file(&file.file_id, &ciphertext)?;
        let dest = out_dir.join(&filename);
        fs::write(&dest, &plaintext)?;
        println!("wrote {} ({} bytes)", dest.display(), plaintext.len());
    }

    if opened.files().is_empty() && opened.subject().is_none() && opened.body().is_none() {
        bail!("capsa opened but had no content to show");
    }
    Ok(())
}
