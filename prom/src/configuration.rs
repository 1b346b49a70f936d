#[derive(Clone, Debug)]
pub struct Configuration {
    pub base_path: String,
}
