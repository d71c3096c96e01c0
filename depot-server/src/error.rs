//! Process exit codes for the CLI wrapper (§6.6).

use depot_values::DepotError;

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_GENERIC_ERROR: i32 = 1;
pub const EXIT_INVALID_USAGE: i32 = 2;
pub const EXIT_NOT_FOUND: i32 = 3;
pub const EXIT_AUTH_REQUIRED: i32 = 4;
pub const EXIT_INSUFFICIENT_DISK_SPACE: i32 = 5;
pub const EXIT_CANCELLED: i32 = 6;

/// Maps an abstract error kind (§7) to the exit code a CLI wrapper should use.
pub fn exit_code_for(err: &DepotError) -> i32 {
    match err {
        DepotError::NotFound(_) | DepotError::ModelSourceNotFound(_) => EXIT_NOT_FOUND,
        DepotError::AuthRequired(_) => EXIT_AUTH_REQUIRED,
        DepotError::InsufficientDiskSpace { .. } => EXIT_INSUFFICIENT_DISK_SPACE,
        DepotError::Cancelled => EXIT_CANCELLED,
        DepotError::InvalidIdentifier(_) | DepotError::InvalidRequest(_) => EXIT_INVALID_USAGE,
        _ => EXIT_GENERIC_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_kinds_to_their_documented_codes() {
        assert_eq!(exit_code_for(&DepotError::NotFound("x".into())), EXIT_NOT_FOUND);
        assert_eq!(exit_code_for(&DepotError::AuthRequired("x".into())), EXIT_AUTH_REQUIRED);
        assert_eq!(
            exit_code_for(&DepotError::InsufficientDiskSpace {
                required: "1 GiB".into(),
                available: "10 MiB".into()
            }),
            EXIT_INSUFFICIENT_DISK_SPACE
        );
        assert_eq!(exit_code_for(&DepotError::Cancelled), EXIT_CANCELLED);
        assert_eq!(exit_code_for(&DepotError::InvalidRequest("x".into())), EXIT_INVALID_USAGE);
        assert_eq!(exit_code_for(&DepotError::Transient("x".into())), EXIT_GENERIC_ERROR);
    }
}
