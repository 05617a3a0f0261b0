use chrono::{DateTime, Utc};
use tracing::{debug, error, trace};

use crate::window_api::ActiveWindowObserver;

use super::{observation::Observation, title_cache::TitleCache};

/// Asks the observer what is in front and attaches a (cached) window title to it.
pub struct Sampler {
    observer: Box<dyn ActiveWindowObserver>,
    title_cache: TitleCache,
}

impl Sampler {
    pub fn new(observer: Box<dyn ActiveWindowObserver>, title_cache: TitleCache) -> Self {
        Self {
            observer,
            title_cache,
        }
    }

    /// Takes one sample. Nothing in front, or an observer failure, is a gap rather than an error.
    pub fn sample(&mut self, moment: DateTime<Utc>) -> Option<Observation> {
        let application = match self.observer.current_foreground_app() {
            Ok(Some(application)) => application,
            Ok(None) => {
                trace!("Nothing is in front, skipping sample");
                return None;
            }
            Err(e) => {
                error!("Encountered an error during collection {:?}", e);
                return None;
            }
        };

        let observer = &mut self.observer;
        let window_title = self
            .title_cache
            .resolve(&application, moment, |app| observer.current_window_title(app));

        let observation = Observation {
            application: application.into(),
            window_title,
            moment,
        };
        debug!("Sampled {:?}", observation);
        Some(observation)
    }
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;
    use chrono::{TimeZone, Utc};
    use mockall::predicate::eq;

    use crate::{
        daemon::collection::title_cache::TitleCache, window_api::MockActiveWindowObserver,
    };

    use super::Sampler;

    #[test]
    fn observer_gaps_and_errors_yield_nothing() {
        let mut observer = MockActiveWindowObserver::new();
        let mut responses = vec![Ok(None), Err(anyhow!("workspace unavailable"))].into_iter();
        observer
            .expect_current_foreground_app()
            .times(2)
            .returning(move || responses.next().unwrap());
        observer.expect_current_window_title().never();

        let mut sampler = Sampler::new(Box::new(observer), TitleCache::default());
        let now = Utc.with_ymd_and_hms(2024, 4, 5, 12, 0, 0).unwrap();
        assert_eq!(sampler.sample(now), None);
        assert_eq!(sampler.sample(now), None);
    }

    #[test]
    fn browser_titles_are_attached() {
        let mut observer = MockActiveWindowObserver::new();
        observer
            .expect_current_foreground_app()
            .returning(|| Ok(Some("Google Chrome".into())));
        observer
            .expect_current_window_title()
            .with(eq("Google Chrome"))
            .times(1)
            .returning(|_| Some("Inbox".into()));

        let mut sampler = Sampler::new(Box::new(observer), TitleCache::default());
        let now = Utc.with_ymd_and_hms(2024, 4, 5, 12, 0, 0).unwrap();

        let first = sampler.sample(now).unwrap();
        let second = sampler.sample(now).unwrap();
        assert_eq!(first.application.as_ref(), "Google Chrome");
        assert_eq!(first.window_title.as_deref(), Some("Inbox"));
        assert_eq!(second, first);
    }
}
