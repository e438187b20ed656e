use std::fmt;

/// What a single job asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Install,
    Remove,
    Update,
    UpdateAll,
}

/// One element of a request.
///
/// Unknown package names are allowed; the solver surfaces them as
/// unsatisfiable install jobs rather than rejecting the request up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub kind: JobKind,
    pub name: Option<String>,
    pub constraint: Option<String>,
}

impl Job {
    fn install(name: String, constraint: Option<String>) -> Self {
        Self {
            kind: JobKind::Install,
            name: Some(name),
            constraint,
        }
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self.kind {
            JobKind::Install => "install",
            JobKind::Remove => "remove",
            JobKind::Update => "update",
            JobKind::UpdateAll => "update all",
        };
        match (&self.name, &self.constraint) {
            (Some(name), Some(constraint)) => write!(f, "{verb} {name} {constraint}"),
            (Some(name), None) => write!(f, "{verb} {name}"),
            _ => write!(f, "{verb}"),
        }
    }
}

/// User intent: an ordered list of jobs.
#[derive(Debug, Clone, Default)]
pub struct Request {
    jobs: Vec<Job>,
}

impl Request {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests installation of a package matching the constraint.
    pub fn install(&mut self, name: impl Into<String>, constraint: impl Into<String>) -> &mut Self {
        self.jobs.push(Job::install(
            name.into().to_lowercase(),
            Some(constraint.into()),
        ));
        self
    }

    /// Requests installation of any version of a package.
    pub fn install_any(&mut self, name: impl Into<String>) -> &mut Self {
        self.jobs.push(Job::install(name.into().to_lowercase(), None));
        self
    }

    pub fn remove(&mut self, name: impl Into<String>) -> &mut Self {
        self.jobs.push(Job {
            kind: JobKind::Remove,
            name: Some(name.into().to_lowercase()),
            constraint: None,
        });
        self
    }

    /// Allows one installed package to move to a newer version.
    pub fn update(&mut self, name: impl Into<String>) -> &mut Self {
        self.jobs.push(Job {
            kind: JobKind::Update,
            name: Some(name.into().to_lowercase()),
            constraint: None,
        });
        self
    }

    /// Allows every installed package to move.
    pub fn update_all(&mut self) -> &mut Self {
        self.jobs.push(Job {
            kind: JobKind::UpdateAll,
            name: None,
            constraint: None,
        });
        self
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Whether an installed package of this name may be replaced by a newer
    /// version during this solve.
    pub fn is_update_allowed(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.jobs.iter().any(|job| match job.kind {
            JobKind::UpdateAll => true,
            JobKind::Update => job.name.as_deref() == Some(name.as_str()),
            _ => false,
        })
    }

    /// Whether a remove job targets this name.
    pub fn is_remove_requested(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.jobs.iter().any(|job| {
            job.kind == JobKind::Remove && job.name.as_deref() == Some(name.as_str())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jobs_keep_order() {
        let mut request = Request::new();
        request.install("Vendor/A", "^1.0").remove("vendor/b");

        let jobs = request.jobs();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].kind, JobKind::Install);
        assert_eq!(jobs[0].name.as_deref(), Some("vendor/a"));
        assert_eq!(jobs[0].constraint.as_deref(), Some("^1.0"));
        assert_eq!(jobs[1].kind, JobKind::Remove);
    }

    #[test]
    fn test_update_allowlist() {
        let mut request = Request::new();
        assert!(!request.is_update_allowed("vendor/a"));

        request.update("vendor/a");
        assert!(request.is_update_allowed("vendor/a"));
        assert!(!request.is_update_allowed("vendor/b"));

        request.update_all();
        assert!(request.is_update_allowed("vendor/b"));
    }

    #[test]
    fn test_remove_requested() {
        let mut request = Request::new();
        request.remove("vendor/a");
        assert!(request.is_remove_requested("vendor/a"));
        assert!(!request.is_remove_requested("vendor/b"));
    }

    #[test]
    fn test_job_display() {
        let mut request = Request::new();
        request.install("vendor/a", "^1.0");
        assert_eq!(request.jobs()[0].to_string(), "install vendor/a ^1.0");
    }
}
