/// Asserts the state of a phase controller in an engine snapshot.
#[macro_export]
macro_rules! assert_phase {
    ($engine:expr, $id:expr, $state:expr) => {
        let state = $engine
            .phase($id)
            .expect("Phase controller not found in engine")
            .state();
        assert_eq!(state, $state, "Phase controller {} state mismatch", $id);
    };
}

/// Asserts that a value lies within inclusive bounds.
#[macro_export]
macro_rules! assert_within {
    ($value:expr, $bounds:expr) => {
        let value = $value;
        let bounds = $bounds;
        assert!(
            value >= bounds.min && value <= bounds.max,
            "Value {} outside [{}, {}]",
            value,
            bounds.min,
            bounds.max
        );
    };
}

/// Asserts that a pool's shares sum to one.
#[macro_export]
macro_rules! assert_normalized {
    ($pool:expr) => {
        let total = $pool.total();
        assert!(
            (total - 1.0).abs() < 1e-9,
            "Pool {} shares sum to {}",
            $pool.id(),
            total
        );
    };
}

/// Asserts that a result is an engine error of the given variant.
#[macro_export]
macro_rules! assert_engine_err {
    ($result:expr, $variant:pat) => {
        match $result {
            Err($variant) => {}
            other => panic!("Expected {}, got {:?}", stringify!($variant), other),
        }
    };
}
