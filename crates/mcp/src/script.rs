// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mini script grammar for `agent-coordination.run_agents`.
//!
//! ```text
//! script     := stage ("&&" stage)*
//! stage      := invocation ("&" invocation)*
//! invocation := NAME qualifier? "'" PROMPT "'"
//! qualifier  := "[" "input:" FILE ("," "tail:" N)? "]"
//! ```
//!
//! Stages separated by `&&` run sequentially; invocations joined by `&`
//! within a stage run in parallel.

use thiserror::Error;

/// Parse errors carry enough context for the agent to correct the script.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScriptError {
    #[error("empty script")]
    Empty,

    #[error("expected agent name at offset {0}")]
    ExpectedName(usize),

    #[error("expected single-quoted prompt after agent '{0}'")]
    ExpectedPrompt(String),

    #[error("unterminated prompt for agent '{0}'")]
    UnterminatedPrompt(String),

    #[error("malformed input qualifier: {0}")]
    BadQualifier(String),

    #[error("dangling operator at end of script")]
    DanglingOperator,
}

/// `[input:file,tail:N]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputQualifier {
    pub file: String,
    pub tail: Option<u64>,
}

/// One agent invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptInvocation {
    pub agent: String,
    pub prompt: String,
    pub input: Option<InputQualifier>,
}

/// A parsed script: sequential stages of parallel invocations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    pub stages: Vec<Vec<ScriptInvocation>>,
}

impl Script {
    /// Parse a script string.
    pub fn parse(input: &str) -> Result<Self, ScriptError> {
        let mut parser = Parser::new(input);
        parser.script()
    }

    /// Every referenced agent name, in order of appearance.
    pub fn agent_names(&self) -> Vec<&str> {
        self.stages
            .iter()
            .flatten()
            .map(|i| i.agent.as_str())
            .collect()
    }
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn script(&mut self) -> Result<Script, ScriptError> {
        self.skip_ws();
        if self.eof() {
            return Err(ScriptError::Empty);
        }

        let mut stages = Vec::new();
        let mut current = vec![self.invocation()?];

        loop {
            self.skip_ws();
            if self.eof() {
                break;
            }
            if self.eat("&&") {
                stages.push(std::mem::take(&mut current));
                current.push(self.invocation()?);
            } else if self.eat("&") {
                current.push(self.invocation()?);
            } else {
                return Err(ScriptError::ExpectedName(self.pos));
            }
        }

        stages.push(current);
        Ok(Script { stages })
    }

    fn invocation(&mut self) -> Result<ScriptInvocation, ScriptError> {
        self.skip_ws();
        if self.eof() {
            return Err(ScriptError::DanglingOperator);
        }

        let agent = self.name()?;
        self.skip_ws();

        let input = if self.peek() == Some('[') {
            Some(self.qualifier()?)
        } else {
            None
        };
        self.skip_ws();

        let prompt = self.prompt(&agent)?;
        Ok(ScriptInvocation {
            agent,
            prompt,
            input,
        })
    }

    fn name(&mut self) -> Result<String, ScriptError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
        if self.pos == start {
            return Err(ScriptError::ExpectedName(start));
        }
        Ok(self.input[start..self.pos].to_string())
    }

    fn qualifier(&mut self) -> Result<InputQualifier, ScriptError> {
        // consume '['
        self.pos += 1;
        let end = self.input[self.pos..]
            .find(']')
            .map(|i| self.pos + i)
            .ok_or_else(|| ScriptError::BadQualifier("missing ']'".to_string()))?;
        let body = &self.input[self.pos..end];
        self.pos = end + 1;

        let mut file = None;
        let mut tail = None;
        for part in body.split(',') {
            let Some((key, value)) = part.split_once(':') else {
                return Err(ScriptError::BadQualifier(part.to_string()));
            };
            match key.trim() {
                "input" => file = Some(value.trim().to_string()),
                "tail" => {
                    tail = Some(value.trim().parse::<u64>().map_err(|_| {
                        ScriptError::BadQualifier(format!("tail is not a number: {value}"))
                    })?);
                }
                other => return Err(ScriptError::BadQualifier(other.to_string())),
            }
        }

        match file {
            Some(file) => Ok(InputQualifier { file, tail }),
            None => Err(ScriptError::BadQualifier("missing input:".to_string())),
        }
    }

    fn prompt(&mut self, agent: &str) -> Result<String, ScriptError> {
        if self.peek() != Some('\'') {
            return Err(ScriptError::ExpectedPrompt(agent.to_string()));
        }
        self.pos += 1;
        let end = self.input[self.pos..]
            .find('\'')
            .map(|i| self.pos + i)
            .ok_or_else(|| ScriptError::UnterminatedPrompt(agent.to_string()))?;
        let prompt = self.input[self.pos..end].to_string();
        self.pos = end + 1;
        Ok(prompt)
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn eat(&mut self, token: &str) -> bool {
        if self.input[self.pos..].starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn eof(&self) -> bool {
        self.pos >= self.input.len()
    }
}

#[cfg(test)]
#[path = "script_tests.rs"]
mod tests;
