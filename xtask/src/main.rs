//! Build automation tasks for nftfix
//!
//! Currently generates the CLI reference from the clap definitions.

use clap::Parser;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Build automation tasks for nftfix", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Generate the CLI reference in markdown
    GenerateCliDocs {
        /// Output directory for generated documentation
        #[arg(short, long, default_value = "docs")]
        output_dir: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::GenerateCliDocs { output_dir } => generate_cli_docs(&output_dir)?,
    }

    Ok(())
}

fn generate_cli_docs(output_dir: &str) -> anyhow::Result<()> {
    println!("Generating CLI documentation...");

    let markdown = clap_markdown::help_markdown::<nftfix_cli::Cli>();

    let content = format!(
        r#"# nftfix CLI Reference

Generated from the CLI source code on {}.

## Workflow

```bash
# Audit every batch in cmids.txt, checkpointing verdicts under ./cmids
nftfix validate --cmids cmids.txt

# Upload one repaired document per affected batch
nftfix upload --cluster devnet --payer payer.json

# Point the invalid records at the uploaded document
nftfix update --cluster devnet --payer payer.json --update-authority authority.json

# Or everything at once, re-evaluating existing verdicts
nftfix runall --cmids cmids.txt --payer payer.json --update-authority authority.json
```

Every step is resumable: records with a verdict are skipped, and upload and
update stamps are written per cluster once a step succeeds.

## Commands

{}

## Environment Variables

- `HOLAPLEX_INDEXER_POSTGRES_URL` - Indexer database used to enumerate batch records
- `NFTFIX_DATA_DIR` - Checkpoint directory (default: `./cmids`)
- `NFTFIX_SUMMARY_DIR` - Where `summary_<nanos>.json` files are written (default: `.`)
- `NFTFIX_MIRROR_HOST` - Host that replaces IPFS gateway URLs (default: `assets.holaplex.tools`)
- `NFTFIX_CONCURRENCY` - Records of one batch fetched at the same time (default: `8`)
- `NFTFIX_MAX_ATTEMPTS` - Fetch attempts per document (default: `16`)
- `NFTFIX_FETCH_TIMEOUT_SECS` - Per-attempt timeout (default: `10`)
- `NFTFIX_PUBLISH_HELPER` - Upload/update helper command (default: `ts-node nftutil.ts`)
- `LOG_LEVEL`, `LOG_OUTPUT`, `LOG_FORMAT`, `LOG_DIR`, `LOG_FILTER` - Logging

---

*To update, run `cargo xtask generate-cli-docs`.*
"#,
        chrono::Utc::now().format("%Y-%m-%d"),
        markdown
    );

    let output_path = PathBuf::from(output_dir);
    fs::create_dir_all(&output_path)?;

    let file_path = output_path.join("cli-reference.md");
    fs::write(&file_path, content)?;

    println!("✅ Generated CLI documentation at: {}", file_path.display());

    Ok(())
}
