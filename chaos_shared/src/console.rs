//! Console system.
//!
//! Provides:
//! - Console variables (cvars) with typed values
//! - Command registration and execution
//! - Input parsing
//!
//! # Usage
//! ```ignore
//! let mut console = Console::new();
//! console.register_cvar("chaos_dispatch", CvarValue::Bool(true), "Run the effect timer", CvarFlags::NONE);
//! console.exec("chaos_dispatch false")?;
//! ```

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use anyhow::{anyhow, bail, Context};

use crate::options::OptionsFile;

/// Console variable value.
#[derive(Debug, Clone, PartialEq)]
pub enum CvarValue {
    Int(i64),
    Float(f64),
    String(String),
    Bool(bool),
}

impl CvarValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            CvarValue::Int(v) => Some(*v),
            CvarValue::Float(v) => Some(*v as i64),
            CvarValue::Bool(v) => Some(i64::from(*v)),
            CvarValue::String(s) => s.parse().ok(),
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            CvarValue::Float(v) => Some(*v),
            CvarValue::Int(v) => Some(*v as f64),
            CvarValue::String(s) => s.parse().ok(),
            CvarValue::Bool(_) => None,
        }
    }

    pub fn as_bool(&self) -> bool {
        match self {
            CvarValue::Bool(v) => *v,
            CvarValue::Int(v) => *v != 0,
            CvarValue::Float(v) => *v != 0.0,
            CvarValue::String(s) => !s.is_empty() && s != "0" && s.to_lowercase() != "false",
        }
    }

    /// Parses user input: int, then float, then bool, then string.
    pub fn parse(input: &str) -> Self {
        if let Ok(v) = input.parse::<i64>() {
            CvarValue::Int(v)
        } else if let Ok(v) = input.parse::<f64>() {
            CvarValue::Float(v)
        } else if input == "true" {
            CvarValue::Bool(true)
        } else if input == "false" {
            CvarValue::Bool(false)
        } else {
            CvarValue::String(input.trim_matches('"').to_string())
        }
    }
}

impl std::fmt::Display for CvarValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CvarValue::Int(v) => write!(f, "{}", v),
            CvarValue::Float(v) => write!(f, "{}", v),
            CvarValue::String(v) => write!(f, "\"{}\"", v),
            CvarValue::Bool(v) => write!(f, "{}", v),
        }
    }
}

/// Console variable metadata.
#[derive(Debug, Clone)]
pub struct Cvar {
    pub name: String,
    pub value: CvarValue,
    pub default: CvarValue,
    pub description: String,
    pub flags: CvarFlags,
}

bitflags::bitflags! {
    /// Cvar flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CvarFlags: u32 {
        const NONE = 0;
        const ARCHIVE = 1 << 0;    // Written back to the options file
        const READ_ONLY = 1 << 1;  // Rejects `set`
    }
}

/// Command handler function type.
pub type CommandHandler = Box<dyn Fn(&[&str], &mut ConsoleContext) -> anyhow::Result<()> + Send + Sync>;

type CvarTable = Arc<RwLock<HashMap<String, Cvar>>>;

/// Context passed to command handlers.
pub struct ConsoleContext {
    /// Output buffer for command responses.
    pub output: Vec<String>,
    cvars: CvarTable,
    commands: Vec<String>,
}

impl ConsoleContext {
    pub fn print(&mut self, msg: impl Into<String>) {
        self.output.push(msg.into());
    }

    pub fn set_cvar(&self, name: &str, value: CvarValue) -> anyhow::Result<()> {
        write_cvar(&self.cvars, name, value)
    }
}

fn read_cvar(cvars: &CvarTable, name: &str) -> Option<CvarValue> {
    cvars.read().ok()?.get(name).map(|c| c.value.clone())
}

fn write_cvar(cvars: &CvarTable, name: &str, value: CvarValue) -> anyhow::Result<()> {
    let mut cvars = cvars.write().map_err(|_| anyhow!("cvar lock poisoned"))?;
    let Some(cvar) = cvars.get_mut(name) else {
        bail!("unknown cvar: {}", name);
    };
    if cvar.flags.contains(CvarFlags::READ_ONLY) {
        bail!("cvar '{}' is read-only", name);
    }
    cvar.value = value;
    Ok(())
}

/// The console.
pub struct Console {
    cvars: CvarTable,
    commands: HashMap<String, CommandHandler>,
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

impl Console {
    pub fn new() -> Self {
        let mut console = Self {
            cvars: Arc::new(RwLock::new(HashMap::new())),
            commands: HashMap::new(),
        };

        console.register_builtin_commands();
        console
    }

    fn register_builtin_commands(&mut self) {
        // echo <text>
        self.register_command("echo", |args, ctx| {
            ctx.print(args.join(" "));
            Ok(())
        });

        // help [cvar]
        self.register_command("help", |args, ctx| {
            match args.first() {
                None => {
                    let commands = ctx.commands.join(", ");
                    ctx.print(format!("Available commands: {}", commands));
                }
                Some(name) => {
                    let description = ctx
                        .cvars
                        .read()
                        .map_err(|_| anyhow!("cvar lock poisoned"))?
                        .get(*name)
                        .map(|c| c.description.clone());
                    match description {
                        Some(d) => ctx.print(format!("{}: {}", name, d)),
                        None => ctx.print(format!("No help for '{}'", name)),
                    }
                }
            }
            Ok(())
        });

        // cvarlist
        self.register_command("cvarlist", |_args, ctx| {
            let mut lines: Vec<String> = ctx
                .cvars
                .read()
                .map_err(|_| anyhow!("cvar lock poisoned"))?
                .values()
                .map(|cvar| format!("  {} = {} (default: {})", cvar.name, cvar.value, cvar.default))
                .collect();
            lines.sort();
            for line in lines {
                ctx.print(line);
            }
            Ok(())
        });

        // set <cvar> <value>
        self.register_command("set", |args, ctx| {
            if args.len() < 2 {
                bail!("usage: set <cvar> <value>");
            }
            let name = args[0];
            let value = CvarValue::parse(&args[1..].join(" "));
            let shown = value.to_string();
            ctx.set_cvar(name, value)?;
            ctx.print(format!("{} = {}", name, shown));
            Ok(())
        });
    }

    /// Registers a console variable.
    pub fn register_cvar(&mut self, name: &str, default: CvarValue, description: &str, flags: CvarFlags) {
        let cvar = Cvar {
            name: name.to_string(),
            value: default.clone(),
            default,
            description: description.to_string(),
            flags,
        };
        if let Ok(mut cvars) = self.cvars.write() {
            cvars.insert(name.to_string(), cvar);
        }
    }

    /// Registers a command.
    pub fn register_command<F>(&mut self, name: &str, handler: F)
    where
        F: Fn(&[&str], &mut ConsoleContext) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.commands.insert(name.to_string(), Box::new(handler));
    }

    /// Registered command names, sorted.
    pub fn command_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.commands.keys().cloned().collect();
        names.sort();
        names
    }

    /// Executes a console command line.
    pub fn exec(&mut self, line: &str) -> anyhow::Result<Vec<String>> {
        let line = line.trim();
        if line.is_empty() || line.starts_with("//") {
            return Ok(Vec::new());
        }

        let tokens = parse_command_line(line);
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        let cmd_name = &tokens[0];
        let args: Vec<&str> = tokens[1..].iter().map(|s| s.as_str()).collect();

        let mut ctx = ConsoleContext {
            output: Vec::new(),
            cvars: Arc::clone(&self.cvars),
            commands: self.command_names(),
        };

        // Bare cvar name queries it, cvar name plus value sets it.
        if !self.commands.contains_key(cmd_name.as_str()) {
            let cvar_info = self.cvars.read().ok().and_then(|cvars| {
                cvars
                    .get(cmd_name.as_str())
                    .map(|cvar| (cvar.value.clone(), cvar.default.clone()))
            });

            if let Some((value, default)) = cvar_info {
                if args.is_empty() {
                    ctx.print(format!("{} = {} (default: {})", cmd_name, value, default));
                    return Ok(ctx.output);
                }
                let set_line = format!("set {} {}", cmd_name, args.join(" "));
                return self.exec(&set_line);
            }
        }

        if let Some(handler) = self.commands.get(cmd_name.as_str()) {
            handler(&args, &mut ctx).with_context(|| format!("command '{}'", cmd_name))?;
        } else {
            ctx.print(format!("Unknown command: {}", cmd_name));
        }

        Ok(ctx.output)
    }

    /// Gets a cvar value.
    pub fn get_cvar(&self, name: &str) -> Option<CvarValue> {
        read_cvar(&self.cvars, name)
    }

    /// Sets a cvar value.
    pub fn set_cvar(&self, name: &str, value: CvarValue) -> anyhow::Result<()> {
        write_cvar(&self.cvars, name, value)
    }

    /// Writes every `ARCHIVE` cvar into `file`. Returns how many were written.
    pub fn archive_into(&self, file: &mut OptionsFile) -> anyhow::Result<usize> {
        let cvars = self.cvars.read().map_err(|_| anyhow!("cvar lock poisoned"))?;
        let mut written = 0;
        for cvar in cvars.values() {
            if !cvar.flags.contains(CvarFlags::ARCHIVE) {
                continue;
            }
            match &cvar.value {
                CvarValue::Bool(v) => file.write_bool(&cvar.name, *v),
                CvarValue::String(v) => file.write_value(&cvar.name, v),
                other => file.write_value(&cvar.name, &other.to_string()),
            }
            written += 1;
        }
        Ok(written)
    }
}

/// Parses a command line into tokens, respecting quotes.
fn parse_command_line(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in line.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            ' ' | '\t' if !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }

    if !current.is_empty() {
        tokens.push(current);
    }

    tokens
}
