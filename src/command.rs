//! Line commands for the interactive front end
//!
//! Every command the prompt understands is one variant of [`Command`];
//! [`dispatch`] runs it against a [`Session`] and prints the outcome.

use crate::core::types::{MatchReport, MemoryError, MemoryResult, ProcessId, ScanType, TypedValue};
use crate::core::VERSION;
use crate::memory::RegionSource;
use crate::process::TargetProcess;
use crate::session::{Session, SetSpec};
use std::io::Write;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio_util::sync::CancellationToken;

pub const HELP: &str = "\
<number>            search for an exact value (decimal, 0x hex, 0 octal, optional -)
> < =               keep matches that increased, decreased or stayed the same
snapshot            track every readable address, to narrow with > < = later
list                show matches with value, live widths, raw bytes and region
delete N            stop tracking match N
set [ids=]V[/S] ... write V to all or the listed matches, every S seconds if given
watch N             print match N whenever its value changes
lregions            list the regions being scanned
dregion N           drop region N and its matches
reset               forget all matches and re-read regions
pid [N]             show or change the target process
version             print the version
help                print this text
exit                leave";

/// A parsed prompt line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Search(TypedValue),
    Compare(ScanType),
    Snapshot,
    List,
    Delete(usize),
    Set(Vec<SetSpec>),
    Watch(usize),
    Regions,
    DeleteRegion(usize),
    Reset,
    Pid(Option<ProcessId>),
    Version,
    Help,
    Exit,
}

/// Whether the prompt keeps going after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

fn index_argument(command: &str, argument: Option<&str>) -> MemoryResult<usize> {
    let argument = argument.ok_or_else(|| MemoryError::parse_failed(command, "missing number"))?;
    argument
        .parse()
        .map_err(|_| MemoryError::parse_failed(argument, "expected a match or region number"))
}

impl Command {
    /// Parses one line; blank lines yield `None`
    pub fn parse(line: &str) -> MemoryResult<Option<Command>> {
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            return Ok(None);
        };
        let argument = words.next();

        let command = match head {
            ">" => Command::Compare(ScanType::Increment),
            "<" => Command::Compare(ScanType::Decrement),
            "=" => Command::Compare(ScanType::Equal),
            "snapshot" => Command::Snapshot,
            "list" => Command::List,
            "delete" => Command::Delete(index_argument(head, argument)?),
            "set" => {
                let specs = argument
                    .into_iter()
                    .chain(words.by_ref())
                    .map(str::parse)
                    .collect::<MemoryResult<Vec<SetSpec>>>()?;
                if specs.is_empty() {
                    return Err(MemoryError::parse_failed(line, "set needs a value"));
                }
                Command::Set(specs)
            }
            "watch" => Command::Watch(index_argument(head, argument)?),
            "lregions" => Command::Regions,
            "dregion" => Command::DeleteRegion(index_argument(head, argument)?),
            "reset" => Command::Reset,
            "pid" => Command::Pid(
                argument
                    .map(|pid| {
                        pid.parse()
                            .map_err(|_| MemoryError::parse_failed(pid, "expected a process id"))
                    })
                    .transpose()?,
            ),
            "version" => Command::Version,
            "help" => Command::Help,
            "exit" | "quit" => Command::Exit,
            literal => Command::Search(TypedValue::from_literal(literal)?),
        };

        if words.next().is_some() {
            return Err(MemoryError::parse_failed(line, "unexpected trailing input"));
        }
        Ok(Some(command))
    }

    /// Commands that loop until cancelled
    pub fn is_long_running(&self) -> bool {
        match self {
            Command::Watch(_) => true,
            Command::Set(specs) => specs.iter().any(|spec| spec.every.is_some()),
            _ => false,
        }
    }
}

/// One line of `list` output
pub fn format_match(report: &MatchReport) -> String {
    format!(
        "[{:2}] {}, {:>20}, [{}], {}, {}",
        report.index,
        report.address,
        report.value.to_string(),
        report.value.flags().labels(),
        hex::encode(report.value.bytes()),
        report.region.as_deref().unwrap_or("unassociated")
    )
}

/// Wall-clock time of day as `HH:MM:SS` UTC
pub fn clock(at: SystemTime) -> String {
    let seconds = at
        .duration_since(UNIX_EPOCH)
        .map(|since| since.as_secs())
        .unwrap_or(0)
        % 86_400;
    format!(
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        seconds / 60 % 60,
        seconds % 60
    )
}

/// Runs `command` and writes its outcome to `out`
pub fn dispatch<P, W>(
    session: &mut Session<P>,
    command: Command,
    cancel: &CancellationToken,
    out: &mut W,
) -> MemoryResult<Flow>
where
    P: TargetProcess + RegionSource,
    W: Write,
{
    match command {
        Command::Search(literal) => {
            let count = session.search_value(&literal)?;
            writeln!(out, "we currently have {} matches", count)?;
        }
        Command::Compare(scan_type) => {
            let count = session.compare(scan_type)?;
            writeln!(out, "we currently have {} matches", count)?;
        }
        Command::Snapshot => {
            let count = session.snapshot()?;
            writeln!(out, "tracking {} addresses", count)?;
        }
        Command::List => {
            for report in session.matches() {
                writeln!(out, "{}", format_match(&report))?;
            }
        }
        Command::Delete(index) => {
            let remaining = session.delete_match(index)?;
            writeln!(out, "{} matches left", remaining)?;
        }
        Command::Set(specs) => {
            let writes = session.set_values(&specs, cancel)?;
            writeln!(out, "{} writes", writes)?;
        }
        Command::Watch(index) => {
            let mut failure = None;
            session.watch(index, cancel, |report| {
                let line = format!("{} {}", clock(SystemTime::now()), format_match(report));
                if let Err(err) = writeln!(out, "{}", line) {
                    failure.get_or_insert(err);
                }
            })?;
            if let Some(err) = failure {
                return Err(err.into());
            }
        }
        Command::Regions => {
            for (index, region) in session.regions().iter().enumerate() {
                writeln!(out, "[{:2}] {}", index, region)?;
            }
        }
        Command::DeleteRegion(index) => {
            let remaining = session.delete_region(index)?;
            writeln!(out, "{} matches left", remaining)?;
        }
        Command::Reset => {
            session.reset()?;
            writeln!(out, "{} regions", session.regions().len())?;
        }
        Command::Pid(None) => match session.target() {
            Some(pid) => writeln!(out, "target is {}", pid)?,
            None => writeln!(out, "no target")?,
        },
        Command::Pid(Some(pid)) => {
            let regions = session.bind(pid)?;
            writeln!(out, "target is {}, {} regions", pid, regions)?;
        }
        Command::Version => writeln!(out, "memscan {}", VERSION)?,
        Command::Help => writeln!(out, "{}", HELP)?,
        Command::Exit => return Ok(Flow::Exit),
    }
    Ok(Flow::Continue)
}
