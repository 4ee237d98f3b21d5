use std::error::Error as StdError;

use thiserror::Error;

use crate::application::deletion::DeletionError;
use crate::application::pagination::PaginationError;
use crate::application::repos::{ImageStoreError, RepoError};
use crate::domain::error::DomainError;
use crate::infra::error::InfraError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Image(#[from] ImageStoreError),
    #[error(transparent)]
    Pagination(#[from] PaginationError),
    #[error(transparent)]
    Infra(#[from] InfraError),
}

impl AppError {
    pub fn is_not_found(&self) -> bool {
        match self {
            AppError::Domain(err) => err.is_not_found(),
            AppError::Repo(RepoError::NotFound) => true,
            _ => false,
        }
    }

    /// The error message followed by every nested source message.
    pub fn chain(&self) -> Vec<String> {
        let mut messages = vec![self.to_string()];
        let mut current = self.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        messages
    }
}

impl From<DeletionError> for AppError {
    fn from(err: DeletionError) -> Self {
        match err {
            DeletionError::CommentNotFound { comment_id, .. } => {
                DomainError::comment_not_found(comment_id).into()
            }
            DeletionError::PostNotFound(post_id) => DomainError::post_not_found(post_id).into(),
            DeletionError::Repo(err) => err.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deletion_not_found_maps_to_domain() {
        let err = AppError::from(DeletionError::CommentNotFound {
            post_id: 1,
            comment_id: 9,
        });
        assert!(err.is_not_found());
        assert!(matches!(
            err,
            AppError::Domain(DomainError::NotFound {
                entity: "comment",
                id: 9
            })
        ));
    }

    #[test]
    fn storage_failures_stay_storage_failures() {
        let err = AppError::from(DeletionError::Repo(RepoError::Timeout));
        assert!(matches!(err, AppError::Repo(RepoError::Timeout)));
        assert!(!err.is_not_found());
    }

    #[test]
    fn chain_includes_sources() {
        let io = std::io::Error::other("disk full");
        let err = AppError::from(ImageStoreError::from(io));
        assert_eq!(err.chain().first().map(String::as_str), Some("disk full"));
    }
}
