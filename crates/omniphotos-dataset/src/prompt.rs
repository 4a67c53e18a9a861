use std::path::PathBuf;

/// Questions asked to the user while loading or preprocessing a dataset.
///
/// Implementations may block, for example to read from a terminal, but must not
/// touch any dataset currently in use since cache loading may run on a background
/// thread.
pub trait Prompt {
    /// Ask a yes/no question.
    fn confirm(&mut self, question: &str) -> bool;

    /// Ask for a folder. `None` means the user gave up.
    fn choose_folder(&mut self, title: &str) -> Option<PathBuf>;
}

/// A prompt that never asks and always gives the same answer.
///
/// Folder requests are always declined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FixedAnswer(pub bool);

impl Prompt for FixedAnswer {
    fn confirm(&mut self, question: &str) -> bool {
        log::debug!("Answering {:?} to: {}", self.0, question);
        self.0
    }

    fn choose_folder(&mut self, title: &str) -> Option<PathBuf> {
        log::debug!("Declining folder request: {}", title);
        None
    }
}

impl<P: Prompt + ?Sized> Prompt for &mut P {
    fn confirm(&mut self, question: &str) -> bool {
        (**self).confirm(question)
    }

    fn choose_folder(&mut self, title: &str) -> Option<PathBuf> {
        (**self).choose_folder(title)
    }
}

impl<P: Prompt + ?Sized> Prompt for Box<P> {
    fn confirm(&mut self, question: &str) -> bool {
        (**self).confirm(question)
    }

    fn choose_folder(&mut self, title: &str) -> Option<PathBuf> {
        (**self).choose_folder(title)
    }
}
