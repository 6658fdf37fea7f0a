//! Side effects decided under the lock and executed after it is released.

use std::sync::Arc;

use crate::listener::{LifecycleListener, ListenerId, SessionHandle};
use crate::provider::{Provider, ProviderId};
use crate::service::{ConnectionToken, ProviderService, SessionParams};

use super::group::Dispatch;
use super::request::RequestId;

pub(crate) enum Deferred {
    Connect {
        provider: Arc<Provider>,
        token: ConnectionToken,
    },
    Dispatch {
        provider_id: ProviderId,
        token: ConnectionToken,
        service: Arc<dyn ProviderService>,
        request: RequestId,
        params: SessionParams,
    },
    Notify {
        provider_id: ProviderId,
        token: ConnectionToken,
        lifecycle: Arc<dyn LifecycleListener>,
        listener: ListenerId,
        session: Option<SessionHandle>,
    },
    Disconnect {
        provider_id: ProviderId,
        token: ConnectionToken,
    },
}

impl Deferred {
    pub(crate) fn dispatch(provider_id: ProviderId, token: ConnectionToken, dispatch: Dispatch) -> Self {
        let Dispatch { service, request } = dispatch;
        Self::Dispatch {
            provider_id,
            token,
            service,
            request: request.id,
            params: request.params(),
        }
    }
}
