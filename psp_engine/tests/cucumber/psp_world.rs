use std::fmt::Debug;

use cucumber::World;
use psp_engine::{db_types::Order, order_objects::NotifyOutcome, OrderFlowError, SqliteDatabase};

use crate::support::{
    fixtures::TestSystem,
    prepare_env::{prepare_test_env, random_db_path},
};

#[derive(Default, Debug, World)]
pub struct PspWorld {
    pub system: Option<PspSystem>,
}

/// A test system over a throwaway SQLite database, plus the results of the last few steps.
pub struct PspSystem {
    pub db_path: String,
    pub sys: TestSystem<SqliteDatabase>,
    pub last_order: Option<Order>,
    pub last_error: Option<OrderFlowError>,
    pub last_outcome: Option<NotifyOutcome>,
    /// The stored order, as it was before the last notification
    pub snapshot: Option<Order>,
}

impl Debug for PspSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PspSystem ({})", self.db_path)
    }
}

impl PspWorld {
    pub fn system(&mut self) -> &mut PspSystem {
        self.system.as_mut().expect("PSP system not initialised")
    }

    pub fn sys(&self) -> &TestSystem<SqliteDatabase> {
        &self.system.as_ref().expect("PSP system not initialised").sys
    }

    pub fn last_order(&self) -> &Order {
        let system = self.system.as_ref().expect("PSP system not initialised");
        match (&system.last_order, &system.last_error) {
            (Some(order), _) => order,
            (None, Some(e)) => panic!("The last order was rejected: {e}"),
            (None, None) => panic!("No order has been placed"),
        }
    }

    /// Records the result of an order request.
    pub fn record(&mut self, result: Result<Order, OrderFlowError>) {
        let system = self.system();
        match result {
            Ok(order) => {
                system.last_order = Some(order);
                system.last_error = None;
            },
            Err(e) => {
                system.last_order = None;
                system.last_error = Some(e);
            },
        }
    }
}

impl PspSystem {
    pub async fn new() -> Self {
        let db_path = random_db_path();
        let db = prepare_test_env(&db_path).await;
        let sys = TestSystem::new(db).await;
        Self { db_path, sys, last_order: None, last_error: None, last_outcome: None, snapshot: None }
    }
}
