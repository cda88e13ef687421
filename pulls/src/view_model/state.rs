use corelib::Pull;

/// Snapshot of one asynchronous read as seen by the UI.
///
/// Snapshots are never mutated; every transition builds a new value and
/// publishes it.
#[derive(Clone, Debug, PartialEq)]
pub struct UiState<T> {
    pub is_loading: bool,
    pub data: Option<T>,
    pub message: Option<String>,
}

impl<T> Default for UiState<T> {
    fn default() -> Self {
        Self {
            is_loading: false,
            data: None,
            message: None,
        }
    }
}

impl<T> UiState<T> {
    pub fn idle() -> Self {
        Self::default()
    }

    /// Loading keeps the previous data on screen until the new answer lands.
    pub fn loading(&self) -> Self
    where
        T: Clone,
    {
        Self {
            is_loading: true,
            data: self.data.clone(),
            message: None,
        }
    }

    pub fn succeeded(data: T, message: Option<String>) -> Self {
        Self {
            is_loading: false,
            data: Some(data),
            message,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            is_loading: false,
            data: None,
            message: Some(message.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        !self.is_loading && self.data.is_none() && self.message.is_some()
    }
}

/// Outcome of the negotiation screen's create/update/close actions.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CreateState {
    pub is_loading: bool,
    pub success: bool,
    pub created_pull: Option<Pull>,
    pub message: Option<String>,
}

impl CreateState {
    pub fn loading() -> Self {
        Self {
            is_loading: true,
            ..Self::default()
        }
    }

    pub fn succeeded(pull: Pull, message: impl Into<String>) -> Self {
        Self {
            is_loading: false,
            success: true,
            created_pull: Some(pull),
            message: Some(message.into()),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::default()
        }
    }
}
