//! Feed-forward neural networks as validated layer chains: declarative
//! assembly from neuron shapes and (optionally pretrained) parameter
//! tensors, full-batch gradient-descent training and JSON persistence.

pub mod a_funcs;
pub mod axons;
pub mod context;
pub mod data;
pub mod helpers;
pub mod initializer;
pub mod layers;
pub mod loss;
pub mod network;
pub mod neurons;
pub mod storage;
pub mod trainer;
