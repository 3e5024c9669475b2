pub mod engine;
pub mod states;

pub use engine::{
    reply_mentions_price, QuestionSignalFlow, StageDefinition, StageEngine, TextSignalFlow,
};
pub use states::{Stage, StagePolicy, StageTransition, TurnSignals};
