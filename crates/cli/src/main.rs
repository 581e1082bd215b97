use clap::{Parser, Subcommand};
use hl7::{describe, lookup, CodeTable, MessageVariant};
use rx_core::{load_config, PrescriptionService, RecordFormat};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rxhl7")]
#[command(about = "Prescription to HL7 v2 message converter")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a prescription record (JSON or YAML) to an HL7 message
    Convert {
        /// Path to the prescription record
        record: PathBuf,
        /// YAML message configuration (optional)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Message variant: ORM, ORU, ADT, RDE or a full type code (optional)
        #[arg(long)]
        variant: Option<String>,
        /// Write the message to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Summarise an HL7 reply (e.g. an ACK)
    Inspect {
        /// Path to the reply message
        reply: PathBuf,
    },
    /// Look up a code table entry
    Describe {
        /// Table name (e.g. route, medication_form)
        table: String,
        /// Code to look up
        code: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Convert {
            record,
            config,
            variant,
            output,
        }) => {
            let mut config = load_config(config.as_deref())?;
            if let Some(variant) = variant {
                config = config.with_variant(MessageVariant::from_tag(&variant));
            }
            let service = PrescriptionService::new(config);

            let text = std::fs::read_to_string(&record)?;
            let built = match service.convert_text(&text, RecordFormat::from_path(&record)) {
                Ok(built) => built,
                Err(e) => {
                    eprintln!("Error converting {}: {}", record.display(), e);
                    return Err(e.into());
                }
            };

            match output {
                Some(path) => {
                    std::fs::write(&path, &built.message)?;
                    println!("HL7 message saved to {}", path.display());
                }
                None => {
                    // Segments are \r-separated; print one per line for terminals.
                    for line in built.message.split(hl7::SEGMENT_DELIMITER) {
                        println!("{line}");
                    }
                }
            }

            println!();
            println!("Message type: {}", service.config().message_type.code());
            println!("Control ID: {}", built.control_id);
            println!("Total segments: {}", built.segments.len());
            println!("Segment types: {}", built.segments.join(", "));
        }
        Some(Commands::Inspect { reply }) => {
            let text = std::fs::read_to_string(&reply)?;
            let service = PrescriptionService::new(Default::default());
            let summary = service.read_acknowledgment(&text);
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Some(Commands::Describe { table, code }) => {
            let table: CodeTable = table.parse()?;
            match lookup(table, &code) {
                Some(description) => println!("{}: {} = {}", table.as_str(), code, description),
                None => println!(
                    "{}: {} is not in the table (rendered as {})",
                    table.as_str(),
                    code,
                    describe(table, &code)
                ),
            }
        }
        None => {
            println!("Use 'rxhl7 --help' for commands");
        }
    }

    Ok(())
}
