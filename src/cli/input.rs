//! Line input for `kioskrag chat` using rustyline

use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

/// What the user typed at the chat prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatInput {
    Question(String),
    /// `/clear`: forget the conversation
    Clear,
    /// `/exit`, `/quit` or Ctrl-D
    Exit,
    /// Blank line or Ctrl-C
    Empty,
    /// Unrecognized slash command
    Unknown(String),
}

impl ChatInput {
    /// Classify one trimmed input line
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return ChatInput::Empty;
        }
        match trimmed {
            "/clear" => ChatInput::Clear,
            "/exit" | "/quit" => ChatInput::Exit,
            cmd if cmd.starts_with('/') => ChatInput::Unknown(cmd.to_string()),
            question => ChatInput::Question(question.to_string()),
        }
    }
}

/// Readline wrapper with in-memory line history
pub struct InputHandler {
    editor: DefaultEditor,
    prompt: String,
}

impl InputHandler {
    pub fn new(prompt: impl Into<String>) -> Result<Self> {
        Ok(Self {
            editor: DefaultEditor::new()?,
            prompt: prompt.into(),
        })
    }

    /// Block until the user enters a line
    pub fn read(&mut self) -> Result<ChatInput> {
        match self.editor.readline(&self.prompt) {
            Ok(line) => {
                let input = ChatInput::parse(&line);
                if let ChatInput::Question(ref question) = input {
                    let _ = self.editor.add_history_entry(question.as_str());
                }
                Ok(input)
            }
            Err(ReadlineError::Interrupted) => Ok(ChatInput::Empty),
            Err(ReadlineError::Eof) => Ok(ChatInput::Exit),
            Err(err) => Err(anyhow::anyhow!("Readline error: {}", err)),
        }
    }
}
