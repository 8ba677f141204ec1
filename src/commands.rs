//! Command table and alias resolution.

use anyhow::Result;
use std::collections::BTreeMap;
use std::io::Write;

use crate::error::{precondition, CliError};
use crate::session::Session;

/// What a handler gets to work with.
pub struct Ctx<'a> {
    pub session: &'a mut Session,
    pub out: &'a mut dyn Write,
    pub commands: &'a BTreeMap<String, Command>,
    pub aliases: &'a mut BTreeMap<String, Alias>,
}

pub type Handler = fn(&mut Ctx<'_>, &[String]) -> Result<()>;

#[derive(Clone, Copy)]
pub struct Command {
    handler: Handler,
    doc: &'static str,
}

impl Command {
    pub fn new(handler: Handler, doc: &'static str) -> Self {
        Self { handler, doc }
    }

    /// First line of the documentation, `?` when there is none.
    pub fn desc(&self) -> &str {
        self.doc
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or("?")
    }

    pub fn help(&self) -> &str {
        match self.doc.trim() {
            "" => "?",
            doc => doc,
        }
    }
}

/// A name standing for a command with some arguments already filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alias {
    pub command: String,
    pub args: Vec<String>,
}

#[derive(Default)]
pub struct Registry {
    commands: BTreeMap<String, Command>,
    aliases: BTreeMap<String, Alias>,
}

pub struct RegistryBuilder {
    registry: Registry,
}

impl RegistryBuilder {
    /// Registers `handler` under every name in `names`.
    pub fn command(mut self, names: &[&str], handler: Handler, doc: &'static str) -> Self {
        for name in names {
            self.registry.register(name, Command::new(handler, doc));
        }
        self
    }

    pub fn alias(mut self, name: &str, command: &str, args: &[&str]) -> Self {
        let args = args.iter().map(|a| a.to_string()).collect();
        if let Err(e) = self.registry.alias(name, command, args) {
            tracing::warn!(alias = name, error = %e, "ignoring alias");
        }
        self
    }

    pub fn build(self) -> Registry {
        self.registry
    }
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder {
            registry: Registry::default(),
        }
    }

    /// Adds or replaces a command.
    pub fn register(&mut self, name: &str, command: Command) {
        self.commands.insert(name.to_string(), command);
    }

    /// Adds or replaces an alias. The target must be a command, not another
    /// alias.
    pub fn alias(&mut self, name: &str, command: &str, args: Vec<String>) -> Result<(), CliError> {
        define_alias(&self.commands, &mut self.aliases, name, command, args)
    }

    #[cfg(test)]
    pub fn aliases(&self) -> &BTreeMap<String, Alias> {
        &self.aliases
    }

    /// Runs one line of input. A leading number means `show` that case.
    pub fn call_line(&mut self, session: &mut Session, out: &mut dyn Write, line: &str) -> Result<()> {
        let mut tokens = line.split_whitespace().map(String::from);
        let Some(name) = tokens.next() else {
            return Ok(());
        };
        let args: Vec<String> = tokens.collect();
        if name.chars().all(|c| c.is_ascii_digit()) {
            let mut show_args = vec![name];
            show_args.extend(args);
            return self.resolve_and_call(session, out, "show", &show_args);
        }
        self.resolve_and_call(session, out, &name, &args)
    }

    /// Runs the command or alias `name`. Alias arguments come first.
    pub fn resolve_and_call(
        &mut self,
        session: &mut Session,
        out: &mut dyn Write,
        name: &str,
        args: &[String],
    ) -> Result<()> {
        let (target, args) = match self.aliases.get(name) {
            Some(alias) => {
                let mut full = alias.args.clone();
                full.extend_from_slice(args);
                (alias.command.clone(), full)
            }
            None => (name.to_string(), args.to_vec()),
        };
        let Some(command) = self.commands.get(&target).copied() else {
            precondition!("Unknown command: {}. Type `help` for a list.", name);
        };
        tracing::debug!(command = %target, ?args, "dispatching");
        let mut ctx = Ctx {
            session,
            out,
            commands: &self.commands,
            aliases: &mut self.aliases,
        };
        (command.handler)(&mut ctx, &args)
    }
}

pub fn define_alias(
    commands: &BTreeMap<String, Command>,
    aliases: &mut BTreeMap<String, Alias>,
    name: &str,
    command: &str,
    args: Vec<String>,
) -> Result<(), CliError> {
    if commands.contains_key(name) {
        return Err(CliError::Precondition(format!(
            "`{name}` is a command and cannot be redefined"
        )));
    }
    if aliases.contains_key(command) {
        return Err(CliError::Precondition(format!(
            "`{command}` is an alias; aliases must point at a command"
        )));
    }
    if !commands.contains_key(command) {
        return Err(CliError::Precondition(format!("Unknown command: {command}")));
    }
    aliases.insert(
        name.to_string(),
        Alias {
            command: command.to_string(),
            args,
        },
    );
    Ok(())
}
