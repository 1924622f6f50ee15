// Investigation pipeline: discovery, fetch, parse, normalize, resolve,
// report, coordinated per investigation over the shared connector stack.

pub mod coordinator;
pub mod entity;
pub mod error;
pub mod graph;
pub mod matcher;
pub mod normalize;
pub mod parser;
pub mod planner;
pub mod report;
pub mod resolver;
pub mod scheduler;
pub mod store;
pub mod timeline;
pub mod types;

pub use coordinator::{CoordinatorConfig, EventBus, EventStream, InvestigationCoordinator};
pub use entity::{
    AttributeKey, AttributeMap, AttributeValue, CandidateId, CanonicalForms, EntityCandidate,
    EntityId, LocationKey, NormalizedEntity, ResolvedEntity,
};
pub use error::{PipelineError, Result};
pub use graph::{
    EdgeClass, EntityGraph, GraphEdge, GraphNode, GraphSnapshot, GraphStatistics, Relationship,
};
pub use matcher::{FuzzyMatcher, MatchScore, MatchWeights};
pub use normalize::Normalizer;
pub use parser::Parser;
pub use planner::{DiscoveryPlanner, PlanOutcome, PlannerConfig};
pub use report::{Report, Reporter, RiskAssessment, RiskLevel};
pub use resolver::{EntityResolver, ResolutionOutcome, ResolverConfig};
pub use scheduler::{FetchScheduler, QueryOutcome, ScheduleScope, SchedulerConfig};
pub use store::{InvestigationStore, MemoryStore, RedisStore};
pub use timeline::{DatePrecision, EventType, TimelineBuilder, TimelineEvent};
pub use types::{
    Constraints, GeographicHints, InvestigationRecord, InvestigationRequest, InvestigationStatus,
    ProfessionalHints, ProgressEvent, ProgressEventType, SeedInput, Thresholds,
    VerificationStatus,
};
