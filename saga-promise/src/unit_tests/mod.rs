use crate::{Settlement, State};

mod store_test;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TestState {
    pub log: Vec<String>,
    pub user: Settlement<String>,
}

impl State for TestState {}

impl TestState {
    pub fn push(self, line: impl Into<String>) -> Self {
        let mut log = self.log;
        log.push(line.into());
        Self { log, ..self }
    }
}
