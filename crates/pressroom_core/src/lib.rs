pub mod access;
pub mod analytics;
pub mod domain;
pub mod engine;
pub mod ports;
pub mod trending;
pub mod workflow;

pub use access::{can_access, AccessAction};
pub use domain::{
    AccountRole, AccountStats, Actor, Article, ArticleEvent, ArticleFilters, ArticlePatch,
    ArticleStatus, AuthSession, DailyAnalytics, EventType, Membership, NewArticle, Pagination,
    User, UserCredentials, Visibility, Vote, VoteType,
};
pub use engine::{
    ArticlePage, ArticleView, Engine, EngineError, EngineResult, EventInput, RecordOutcome,
    SaveOutcome, VoteOutcome,
};
pub use ports::{ArticleStore, AuthStore, MembershipService, PortError, PortResult};
