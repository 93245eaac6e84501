//! Parameter vocabulary shared by every zone: generators, modulators, units.

pub mod generator;
pub mod modulator;
pub mod units;

pub use generator::{
    Amount, Generator, GeneratorInfo, GeneratorType, Level, Range, Scope, Unit, GENERATOR_SLOTS,
};
pub use modulator::{
    CurveType, GeneralController, ModDestination, ModSource, Modulator, ModulatorSignature,
    Transform,
};
