use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use reobf::mapping::tiny;
use reobf::{generate_reobf_mappings, ReobfInputs};

#[derive(Parser)]
#[command(name = "reobf")]
#[command(about = "Reobfuscation mapping generator")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the reobfuscation mapping file
    Generate {
        /// Intermediate-to-deobf mapping file
        #[arg(long, value_name = "FILE")]
        input_mappings: PathBuf,

        /// Obf-to-intermediate mapping file
        #[arg(long, value_name = "FILE")]
        notch_to_spigot: PathBuf,

        /// Field-rename source mapping file
        #[arg(long, value_name = "FILE")]
        source_mappings: PathBuf,

        /// Compiled binary to reobfuscate
        #[arg(long, value_name = "JAR")]
        input_jar: PathBuf,

        /// Baseline runtime roots for supertype resolution
        #[arg(long, value_name = "PATH")]
        runtime_root: Vec<PathBuf>,

        /// Output mapping file
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Parse a mapping file and print a summary
    Print {
        /// Input mapping file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Source namespace
        #[arg(long)]
        from: String,

        /// Target namespace
        #[arg(long)]
        to: String,
    },

    /// Reverse a mapping file's namespace pair
    Reverse {
        /// Input mapping file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Source namespace
        #[arg(long)]
        from: String,

        /// Target namespace
        #[arg(long)]
        to: String,

        /// Output mapping file
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match &cli.command {
        Commands::Generate {
            input_mappings,
            notch_to_spigot,
            source_mappings,
            input_jar,
            runtime_root,
            output,
        } => {
            let inputs = ReobfInputs {
                input_mappings: input_mappings.clone(),
                notch_to_spigot_mappings: notch_to_spigot.clone(),
                source_mappings: source_mappings.clone(),
                input_jar: input_jar.clone(),
                runtime_roots: runtime_root.clone(),
                output_mappings: output.clone(),
            };
            generate_reobf_mappings(&inputs)?;
            println!("Wrote {}", output.display());
        }
        Commands::Print { input, from, to } => {
            let set = tiny::read_mapping_file(input, from, to)?;
            for (name, class) in set.all_classes() {
                println!("{} -> {}", name, set.full_deobf_name(&name).unwrap_or_default());
                for (key, method) in class.methods() {
                    println!(
                        "  m {} {} -> {}",
                        key.descriptor,
                        key.name,
                        method.deobf_name.as_deref().unwrap_or("-")
                    );
                }
                for (key, field) in class.fields() {
                    println!(
                        "  f {} {} -> {}",
                        key.ty.as_deref().unwrap_or("-"),
                        key.name,
                        field.deobf_name.as_deref().unwrap_or("-")
                    );
                }
            }
        }
        Commands::Reverse {
            input,
            from,
            to,
            output,
        } => {
            let set = tiny::read_mapping_file(input, from, to)?;
            tiny::write_mapping_file(&set.reverse(), output, to, from)?;
            println!("Wrote {}", output.display());
        }
    }

    Ok(())
}
