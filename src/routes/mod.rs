/// Router Module Index
///
/// Routes are split by the gate they sit behind. `create_router` wraps the
/// authenticated and admin groups in their middleware; a path may appear in
/// several groups with different methods.

/// Reads and the public forms. No session required.
pub mod public;

/// Writes available to any signed-in user.
pub mod authenticated;

/// Writes and listings restricted to the `admin` role.
pub mod admin;
