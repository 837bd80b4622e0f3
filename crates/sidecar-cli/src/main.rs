// sidecar-cli: command-line frontend for sidecar-core
// Argument parsing, locking around mutations, text/JSON output

mod cli;
mod output;

use cli::{Cli, Command, doc_id};
use clap::Parser;
use log::debug;
use output::OutputHandler;
use sidecar_core::lock::{lock_documents, with_document};
use sidecar_core::payload::DOC_PATH_KEY;
use sidecar_core::{DocSettings, SidecarConfig, Value, exists, paths, update_location};
use std::io::{self, ErrorKind};

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .format_target(false)
        .init();
}

/// Parse a `set` value: JSON when it parses, otherwise the raw string.
/// `None` means JSON `null`, which removes the key.
fn parse_value(raw: &str) -> Option<Value> {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(json) => Value::from_json(&json),
        Err(_) => Some(Value::from(raw)),
    }
}

fn reject_reserved(key: &str) -> io::Result<()> {
    if key == DOC_PATH_KEY {
        return Err(io::Error::new(
            ErrorKind::InvalidInput,
            format!("'{}' is managed automatically", DOC_PATH_KEY),
        ));
    }
    Ok(())
}

fn execute(command: Command, config: &SidecarConfig, output: &OutputHandler) -> io::Result<()> {
    match command {
        Command::Show { doc } => {
            let settings = DocSettings::open(config, &doc_id(&doc)?);
            output.emit_settings(settings.data())
        }
        Command::Get { doc, key } => {
            let settings = DocSettings::open(config, &doc_id(&doc)?);
            let value = settings.get(&key).ok_or_else(|| {
                io::Error::new(ErrorKind::NotFound, format!("'{}' is not set", key))
            })?;
            output.emit_value(value)
        }
        Command::Set { doc, key, value } => {
            reject_reserved(&key)?;
            let doc = doc_id(&doc)?;
            let value = parse_value(&value);
            let written = with_document(config, &doc, |settings| {
                match value {
                    Some(value) => settings.set(&key, value),
                    None => settings.remove(&key),
                };
                settings.write()
            })?;
            debug!("set '{}' for {} in {}", key, doc, written.display());
            Ok(())
        }
        Command::Unset { doc, key } => {
            reject_reserved(&key)?;
            let doc = doc_id(&doc)?;
            with_document(config, &doc, |settings| {
                if settings.remove(&key).is_some() {
                    settings.write()?;
                }
                Ok(())
            })?;
            Ok(())
        }
        Command::Candidates { doc } => {
            let settings = DocSettings::resolve(config, &doc_id(&doc)?);
            output.emit_candidates(&settings.scan_candidates())
        }
        Command::Purge { doc } => {
            let report = with_document(config, &doc_id(&doc)?, |settings| {
                Ok(settings.purge(None))
            })?;
            output.emit_purge(&report)
        }
        Command::Exists { doc } => output.emit_flag("exists", exists(config, &doc_id(&doc)?)),
        Command::Mv { old, new } => relocate(config, &doc_id(&old)?, &doc_id(&new)?, false),
        Command::Cp { old, new } => relocate(config, &doc_id(&old)?, &doc_id(&new)?, true),
        Command::Rm { doc } => {
            let doc = doc_id(&doc)?;
            let _locks = lock_documents(config, &[doc.as_str()])?;
            update_location(config, &doc, None, false)?;
            Ok(())
        }
        Command::HistoryName { doc } => {
            let doc = doc_id(&doc)?;
            let name = paths::history_name_for(&doc).ok_or_else(|| {
                io::Error::new(ErrorKind::InvalidInput, "empty document path")
            })?;
            output.emit_text("history_name", &name)
        }
        Command::FromHistory { name } => {
            let doc = paths::doc_id_from_history_name(&name).ok_or_else(|| {
                io::Error::new(
                    ErrorKind::InvalidInput,
                    format!("not a history file name: {}", name),
                )
            })?;
            output.emit_text("doc_path", &doc)
        }
        Command::Config => output.emit_config(config),
    }
}

fn relocate(config: &SidecarConfig, old: &str, new: &str, copy: bool) -> io::Result<()> {
    let _locks = lock_documents(config, &[old, new])?;
    update_location(config, old, Some(new), copy)?;
    Ok(())
}

fn run(cli: Cli) -> io::Result<()> {
    let config = SidecarConfig::load(cli.home)?;
    let output = OutputHandler::new(cli.json_output);
    execute(cli.command, &config, &output)
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("sidecar: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_value_json_and_bare_words() {
        assert_eq!(parse_value("42"), Some(Value::Integer(42)));
        assert_eq!(parse_value("true"), Some(Value::Bool(true)));
        assert_eq!(parse_value("\"quoted\""), Some(Value::from("quoted")));
        assert_eq!(parse_value("chapter 3"), Some(Value::from("chapter 3")));
        assert_eq!(parse_value("null"), None);
    }

    #[test]
    fn test_doc_path_is_reserved() {
        assert!(reject_reserved("doc_path").is_err());
        assert!(reject_reserved("page").is_ok());
    }
}
