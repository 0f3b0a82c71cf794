/// Asserts the manager's view of a pet: running flag and observer count.
#[macro_export]
macro_rules! assert_brain {
    ($manager:expr, $id:expr, running: $running:expr, subscribers: $subs:expr) => {
        assert_eq!(
            $manager.is_running($id),
            $running,
            "Pet {} running flag mismatch",
            $id
        );
        assert_eq!(
            $manager.subscriber_count($id),
            $subs,
            "Pet {} subscriber count mismatch",
            $id
        );
    };
}

/// Asserts that the manager keeps nothing for the pet.
#[macro_export]
macro_rules! assert_brain_gone {
    ($manager:expr, $id:expr) => {
        assert!(
            !$manager.has_brain($id),
            "Pet {} should have no brain but one was found",
            $id
        );
        assert!(!$manager.is_running($id), "Pet {} still running", $id);
    };
}

/// Asserts a batch only holds activations inside the clamp range.
#[macro_export]
macro_rules! assert_activations_bounded {
    ($batch:expr) => {
        for cell in $batch.iter() {
            assert!(
                (-0.1..=1.0).contains(&cell.activation),
                "Cell {} activation {} out of range",
                cell.cell_id,
                cell.activation
            );
        }
    };
}
