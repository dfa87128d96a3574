#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use orodc::cmd::{Runner, format_command};
use orodc::error::{OrodcError, OrodcResult};

/// A scripted reply: commands containing `pattern` get `reply`.
struct Rule {
    pattern: String,
    reply: Result<String, String>,
}

/// In-memory stand-in for `docker` and `ssh-keygen`.
///
/// Networks and volumes live in sets so check-then-create behaves
/// like the real thing. Other commands answer from the scripted
/// rules (first match wins) or succeed with empty output.
#[derive(Default)]
pub struct FakeRunner {
    calls: RefCell<Vec<String>>,
    stdin: RefCell<Vec<String>>,
    networks: RefCell<BTreeSet<String>>,
    volumes: RefCell<BTreeSet<String>>,
    rules: RefCell<Vec<Rule>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_network(self, name: &str) -> Self {
        self.networks.borrow_mut().insert(name.to_string());
        self
    }

    pub fn reply(self, pattern: &str, output: &str) -> Self {
        self.rules.borrow_mut().push(Rule {
            pattern: pattern.to_string(),
            reply: Ok(output.to_string()),
        });
        self
    }

    pub fn fail(self, pattern: &str, message: &str) -> Self {
        self.rules.borrow_mut().push(Rule {
            pattern: pattern.to_string(),
            reply: Err(message.to_string()),
        });
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn stdin(&self) -> Vec<String> {
        self.stdin.borrow().clone()
    }

    pub fn count(&self, pattern: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.contains(pattern))
            .count()
    }

    fn answer(&self, program: &str, args: &[&str]) -> OrodcResult<String> {
        let line = format_command(program, args);
        self.calls.borrow_mut().push(line.clone());

        if let Some(rule) = self
            .rules
            .borrow()
            .iter()
            .find(|r| line.contains(&r.pattern))
        {
            return rule.reply.clone().map_err(OrodcError::Other);
        }

        match (program, args) {
            (_, [noun, "ls", ..]) => Ok(self.objects(noun).join("\n")),
            (_, [noun, "create", name]) => {
                self.objects_mut(noun, |set| set.insert((*name).to_string()));
                Ok(String::new())
            }
            ("ssh-keygen", _) => {
                let key = args
                    .windows(2)
                    .find(|w| w[0] == "-f")
                    .map(|w| w[1])
                    .ok_or_else(|| OrodcError::Other("no -f".into()))?;
                fs::write(key, "PRIVATE")?;
                fs::write(format!("{key}.pub"), "ssh-ed25519 AAAAfake shop\n")?;
                Ok(String::new())
            }
            _ => Ok(String::new()),
        }
    }

    fn objects(&self, noun: &str) -> Vec<String> {
        let set = if noun == "network" {
            self.networks.borrow()
        } else {
            self.volumes.borrow()
        };
        set.iter().cloned().collect()
    }

    fn objects_mut(&self, noun: &str, f: impl FnOnce(&mut BTreeSet<String>) -> bool) {
        if noun == "network" {
            f(&mut self.networks.borrow_mut());
        } else {
            f(&mut self.volumes.borrow_mut());
        }
    }
}

impl Runner for FakeRunner {
    fn capture(&self, program: &str, args: &[&str]) -> OrodcResult<String> {
        self.answer(program, args)
    }

    fn capture_with_stdin(
        &self,
        program: &str,
        args: &[&str],
        stdin_data: &[u8],
    ) -> OrodcResult<String> {
        self.stdin
            .borrow_mut()
            .push(String::from_utf8_lossy(stdin_data).into_owned());
        self.answer(program, args)
    }

    fn interactive(&self, program: &str, args: &[&str]) -> OrodcResult<()> {
        self.answer(program, args).map(|_| ())
    }
}

/// Write `content` to `dir/name`.
pub fn write(dir: &Path, name: &str, content: &str) {
    fs::write(dir.join(name), content).unwrap();
}
