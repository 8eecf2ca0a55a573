//! Service layer for the planner.
//!
//! This module contains the business logic for:
//! - Frame result selection (`FrameAggregator`)
//! - Per-source import runs (`ImportOrchestrator`)
//! - Merging sources into a week (`MergeEngine`)
//! - Slot, capacity and conflict queries (`planner`)
//! - The front-end request channel (`bridge`)

pub mod aggregator;
pub mod bridge;
pub mod merge;
pub mod orchestrator;
pub mod planner;

pub use aggregator::{Aggregated, FrameAggregator};
pub use bridge::{BridgeClient, BridgeMessage, ImportHandler, RequestHandler, serve};
pub use merge::MergeEngine;
pub use orchestrator::{ImportOrchestrator, ImportState, SourcePlan};
pub use planner::{WorkWindow, calculate_capacity, find_available_slot, find_conflicts};
