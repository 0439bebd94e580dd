pub mod classifier;
pub mod correlator;
pub mod ingestor;
pub mod normalizer;
pub mod provider;
pub mod validator;
