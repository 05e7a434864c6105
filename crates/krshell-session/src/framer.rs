// Command framing: echo markers around each command and a line scanner that
// cuts the command's output back out of the shell's continuous stdout.
//
// The markers are fixed text and nothing is escaped, so a command that prints
// a marker line itself will end its frame early.

use krshell_types::{END_TAG, START_TAG};

/// A command wrapped in start/end marker echoes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandEnvelope<'a> {
    pub start_tag: &'a str,
    pub end_tag: &'a str,
    pub command: &'a str,
}

impl<'a> CommandEnvelope<'a> {
    pub fn new(command: &'a str) -> Self {
        Self {
            start_tag: START_TAG,
            end_tag: END_TAG,
            command,
        }
    }

    /// Bytes written to the shell's stdin
    pub fn to_bytes(&self) -> Vec<u8> {
        format!(
            "\necho '{}'\n{}\necho '{}'\n",
            self.start_tag, self.command, self.end_tag
        )
        .into_bytes()
    }
}

/// Scanner position inside one command's output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    AwaitingStart,
    Accumulating,
    Done,
}

/// Line-driven state machine extracting one command's output
#[derive(Debug)]
pub struct OutputFramer {
    start_tag: String,
    end_tag: String,
    state: FrameState,
    buffer: String,
}

impl Default for OutputFramer {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputFramer {
    pub fn new() -> Self {
        Self::with_tags(START_TAG, END_TAG)
    }

    pub fn with_tags(start_tag: &str, end_tag: &str) -> Self {
        Self {
            start_tag: start_tag.to_string(),
            end_tag: end_tag.to_string(),
            state: FrameState::AwaitingStart,
            buffer: String::new(),
        }
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    /// Feed one stdout line (without its newline)
    ///
    /// Returns the trimmed output once the end marker is seen. Lines before
    /// the start marker belong to earlier output and are dropped.
    pub fn push_line(&mut self, line: &str) -> Option<String> {
        match self.state {
            FrameState::Done => None,
            FrameState::AwaitingStart => {
                if let Some(index) = line.find(&self.start_tag) {
                    self.begin(&line[index + self.start_tag.len()..]);
                    // Both markers on one line: empty command output
                    return self.try_finish_same_line();
                }
                None
            }
            FrameState::Accumulating => {
                if let Some(index) = line.find(&self.start_tag) {
                    self.begin(&line[index + self.start_tag.len()..]);
                    return self.try_finish_same_line();
                }
                if let Some(index) = line.find(&self.end_tag) {
                    self.buffer.push_str(&line[..index]);
                    return Some(self.finish());
                }
                self.buffer.push_str(line);
                self.buffer.push('\n');
                None
            }
        }
    }

    /// Whatever was collected so far, for truncated frames
    pub fn into_partial(self) -> String {
        self.buffer.trim().to_string()
    }

    fn begin(&mut self, after_tag: &str) {
        self.buffer.clear();
        self.buffer.push_str(after_tag);
        self.state = FrameState::Accumulating;
    }

    fn try_finish_same_line(&mut self) -> Option<String> {
        let index = self.buffer.find(&self.end_tag)?;
        self.buffer.truncate(index);
        Some(self.finish())
    }

    fn finish(&mut self) -> String {
        self.state = FrameState::Done;
        std::mem::take(&mut self.buffer).trim().to_string()
    }
}
