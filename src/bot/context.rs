use crate::composer::Composer;
use crate::session::SessionStore;

pub struct AppContext {
  composer: Composer,
}

impl AppContext {
  pub fn new(composer: Composer) -> Self {
    Self { composer }
  }

  pub fn composer(&self) -> &Composer {
    &self.composer
  }

  pub fn sessions(&self) -> &SessionStore {
    self.composer.sessions()
  }
}
