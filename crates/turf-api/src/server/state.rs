#[derive(Clone)]
struct AppState {
    inner: std::sync::Arc<Mutex<ControlApi>>,
}

impl AppState {
    fn new(api: ControlApi) -> Self {
        Self {
            inner: std::sync::Arc::new(Mutex::new(api)),
        }
    }
}
