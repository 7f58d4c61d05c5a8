use std::cell::{Cell, RefCell};
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::channel::{Platform, RemoteChannel};
use crate::command::RemoteCommand;
use crate::error::ChannelError;

/// Records every command and answers from a script of prefix matches.
pub struct FakeChannel {
    host: String,
    platform: Platform,
    replies: RefCell<Vec<(String, Result<String, String>)>>,
    commands: RefCell<Vec<String>>,
    uploads: RefCell<Vec<(PathBuf, String)>>,
    upload_exists: Cell<bool>,
    upload_fails: Cell<bool>,
    closed: Rc<Cell<bool>>,
}

impl FakeChannel {
    pub fn new(host: &str) -> Self {
        Self {
            host: host.to_string(),
            platform: Platform::AmazonLinux,
            replies: RefCell::new(Vec::new()),
            commands: RefCell::new(Vec::new()),
            uploads: RefCell::new(Vec::new()),
            upload_exists: Cell::new(false),
            upload_fails: Cell::new(false),
            closed: Rc::new(Cell::new(false)),
        }
    }

    /// Answer commands starting with `prefix` with `output`.
    pub fn reply(self, prefix: &str, output: &str) -> Self {
        self.replies
            .borrow_mut()
            .push((prefix.to_string(), Ok(output.to_string())));
        self
    }

    /// Fail commands starting with `prefix`.
    pub fn fail(self, prefix: &str) -> Self {
        self.replies
            .borrow_mut()
            .push((prefix.to_string(), Err("exit status: 1".to_string())));
        self
    }

    pub fn with_existing_upload(self) -> Self {
        self.upload_exists.set(true);
        self
    }

    pub fn with_failing_upload(self) -> Self {
        self.upload_fails.set(true);
        self
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.borrow().clone()
    }

    pub fn ran(&self, prefix: &str) -> bool {
        self.commands.borrow().iter().any(|c| c.starts_with(prefix))
    }

    pub fn uploads(&self) -> Vec<(PathBuf, String)> {
        self.uploads.borrow().clone()
    }

    /// Stays readable after the channel has been moved into a node.
    pub fn closed_flag(&self) -> Rc<Cell<bool>> {
        Rc::clone(&self.closed)
    }
}

impl RemoteChannel for FakeChannel {
    fn host(&self) -> &str {
        &self.host
    }

    fn platform(&self) -> Platform {
        self.platform
    }

    fn execute(&self, command: &RemoteCommand) -> Result<String, ChannelError> {
        let line = command.to_string();
        self.commands.borrow_mut().push(line.clone());
        let reply = self
            .replies
            .borrow()
            .iter()
            .find(|(prefix, _)| line.starts_with(prefix.as_str()))
            .map(|(_, reply)| reply.clone());
        match reply {
            Some(Ok(output)) => Ok(output),
            Some(Err(reason)) => Err(ChannelError::Command {
                command: line,
                source: io::Error::other(reason),
            }),
            None => Ok(String::new()),
        }
    }

    fn secure_upload(&self, local_path: &Path, remote_path: &str) -> Result<(), ChannelError> {
        if self.upload_exists.get() {
            return Err(ChannelError::AlreadyExists(remote_path.to_string()));
        }
        if self.upload_fails.get() {
            return Err(ChannelError::Upload {
                local: local_path.display().to_string(),
                remote: remote_path.to_string(),
                source: io::Error::other("lost connection"),
            });
        }
        self.uploads
            .borrow_mut()
            .push((local_path.to_path_buf(), remote_path.to_string()));
        Ok(())
    }

    fn close(&mut self) -> Result<(), ChannelError> {
        self.closed.set(true);
        Ok(())
    }
}
