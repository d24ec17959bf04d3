use thiserror::Error;

#[derive(Error, Debug)]
pub enum BlueprintError {
    #[error("provider error: {0}")] Provider(String),
    #[error("schema error: {0}")] Schema(String),
    #[error("image bridge error: {0}")] ImageBridge(String),
    #[error("wizard error: {0}")] Wizard(String),
    #[error("safety violation: {0}")] Safety(String),
}
