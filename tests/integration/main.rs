//! Integration tests for poly-updown

mod engine_test;
mod indicators_test;
mod market_test;
mod position_test;
mod predictor_test;
mod risk_test;
mod support;
