/// Progress report sent by a read worker after each file it finishes
#[derive(Debug, Clone, Default)]
pub struct WorkerStatus {
    pub progress: f32,
    pub files_read: usize,
    pub worker_id: usize,
}

impl WorkerStatus {
    pub fn new(progress: f32, files_read: usize, worker_id: usize) -> Self {
        Self {
            progress,
            files_read,
            worker_id,
        }
    }
}
