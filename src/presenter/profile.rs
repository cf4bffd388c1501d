use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::{
    client::cancellable,
    error::{ErrorKind, ErrorModel},
    model::{Profile, ProfileEdit},
    service::ProfileService,
    state::NetworkClient,
};

use super::{Executor, Machine, View};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProfilePhase {
    Initial,
    Loading,
    Ready,
    Saving,
    Failed(ErrorKind),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ProfilePresenter {
    pub phase: ProfilePhase,
    pub profile: Option<Profile>,
}

#[derive(Debug)]
pub enum ProfileEvent {
    ViewLoaded,
    Retry,
    ProfileLoaded(Profile),
    LoadFailed(ErrorKind),
    EditSubmitted(ProfileEdit),
    /// Favourites the user no longer likes.
    Unliked(Vec<String>),
    ProfileSaved(Profile),
    SaveFailed(ErrorKind),
}

#[derive(Debug, PartialEq)]
pub enum ProfileEffect {
    LoadProfile,
    UploadProfile(ProfileEdit),
    RemoveFavourites(Vec<String>),
    Render(ProfileView),
    ShowError(ErrorModel),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProfileView {
    pub name: String,
    pub avatar: String,
    pub description: String,
    pub website: String,
    pub my_nfts: usize,
    pub favourites: usize,
    pub loading: bool,
}

impl Default for ProfilePresenter {
    fn default() -> Self {
        Self {
            phase: ProfilePhase::Initial,
            profile: None,
        }
    }
}

impl ProfilePresenter {
    pub fn view(&self) -> ProfileView {
        let loading = matches!(self.phase, ProfilePhase::Loading | ProfilePhase::Saving);

        match &self.profile {
            Some(profile) => ProfileView {
                name: profile.name.clone(),
                avatar: profile.avatar.clone(),
                description: profile.description.clone(),
                website: profile.website.clone(),
                my_nfts: profile.nfts.len(),
                favourites: profile.likes.len(),
                loading,
            },
            None => ProfileView {
                loading,
                ..ProfileView::default()
            },
        }
    }

    fn with_phase(self, phase: ProfilePhase) -> Self {
        Self { phase, ..self }
    }

    fn render(self, mut effects: Vec<ProfileEffect>) -> (Self, Vec<ProfileEffect>) {
        effects.insert(0, ProfileEffect::Render(self.view()));
        (self, effects)
    }
}

impl Machine for ProfilePresenter {
    type Event = ProfileEvent;
    type Effect = ProfileEffect;

    fn transition(self, event: ProfileEvent) -> (Self, Vec<ProfileEffect>) {
        use ProfileEvent::*;
        use ProfilePhase::*;

        match (self.phase, event) {
            (Initial | Ready, ViewLoaded) | (Failed(_), ViewLoaded | Retry) => self
                .with_phase(Loading)
                .render(vec![ProfileEffect::LoadProfile]),
            (Loading, ProfileLoaded(profile)) | (Saving, ProfileSaved(profile)) => Self {
                profile: Some(profile),
                ..self
            }
            .with_phase(Ready)
            .render(vec![]),
            (Loading, LoadFailed(kind)) => self
                .with_phase(Failed(kind))
                .render(vec![ProfileEffect::ShowError(ErrorModel::retryable(kind))]),
            (Ready, EditSubmitted(edit)) => self
                .with_phase(Saving)
                .render(vec![ProfileEffect::UploadProfile(edit)]),
            (Ready, Unliked(ids)) if !ids.is_empty() => self
                .with_phase(Saving)
                .render(vec![ProfileEffect::RemoveFavourites(ids)]),
            (Saving, SaveFailed(kind)) => self
                .with_phase(Ready)
                .render(vec![ProfileEffect::ShowError(ErrorModel::notice(kind))]),
            (_, event) => {
                debug!(presenter = "profile", phase = ?self.phase, ?event, "event ignored");
                (self, vec![])
            }
        }
    }
}

pub struct ProfileScreen<N, V> {
    pub profile: ProfileService<N>,
    pub view: V,
    pub cancel: CancellationToken,
}

impl<N, V> Executor<ProfilePresenter> for ProfileScreen<N, V>
where
    N: NetworkClient + Send + Sync,
    V: View,
{
    async fn execute(&self, effect: ProfileEffect) -> Option<ProfileEvent> {
        let saved = match effect {
            ProfileEffect::LoadProfile => {
                return Some(
                    match cancellable(&self.cancel, self.profile.load_profile()).await {
                        Ok(profile) => ProfileEvent::ProfileLoaded(profile),
                        Err(error) => {
                            error!("{}", error);
                            ProfileEvent::LoadFailed(error.kind())
                        }
                    },
                );
            }
            ProfileEffect::UploadProfile(edit) => {
                cancellable(&self.cancel, self.profile.upload_profile(&edit)).await
            }
            ProfileEffect::RemoveFavourites(ids) => {
                cancellable(&self.cancel, self.profile.update_favourites(&ids)).await
            }
            ProfileEffect::Render(profile) => {
                self.view.render_profile(&profile);
                return None;
            }
            ProfileEffect::ShowError(model) => {
                self.view.show_error(&model);
                return None;
            }
        };

        Some(match saved {
            Ok(profile) => ProfileEvent::ProfileSaved(profile),
            Err(error) => {
                error!("{}", error);
                ProfileEvent::SaveFailed(error.kind())
            }
        })
    }
}
