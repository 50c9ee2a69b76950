#![allow(
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation
)]

#[allow(dead_code)]
#[path = "../../benches/test_spaces.rs"]
mod test_spaces;

mod builder;
mod end_to_end;
mod failures;
mod hooks;
mod plan;
mod resume;
mod teardown;
