use crate::reseller::{ResellerConfig, ResellerRepository};
use actix::prelude::*;
use anyhow::Context as AnyhowContext;
use std::sync::Arc;
use typesafe_repository::IdentityOf;

pub struct ResellerService {
    repo: Arc<dyn ResellerRepository>,
}

impl ResellerService {
    pub fn new(repo: Arc<dyn ResellerRepository>) -> Self {
        Self { repo }
    }
}

impl Actor for ResellerService {
    type Context = Context<Self>;
}

#[derive(Message)]
#[rtype(result = "Result<Option<ResellerConfig>, anyhow::Error>")]
pub struct Get(pub IdentityOf<ResellerConfig>);

#[derive(Message)]
#[rtype(result = "Result<Vec<ResellerConfig>, anyhow::Error>")]
pub struct List;

#[derive(Message)]
#[rtype(result = "Result<(), anyhow::Error>")]
pub struct Update(pub ResellerConfig);

#[derive(Message)]
#[rtype(result = "Result<(), anyhow::Error>")]
pub struct Remove(pub IdentityOf<ResellerConfig>);

impl Handler<Get> for ResellerService {
    type Result = ResponseActFuture<Self, Result<Option<ResellerConfig>, anyhow::Error>>;

    fn handle(&mut self, Get(id): Get, _: &mut Self::Context) -> Self::Result {
        let repo = self.repo.clone();
        Box::pin(
            async move {
                repo.get_one(&id)
                    .await
                    .context("Unable to get reseller configuration")
            }
            .into_actor(self),
        )
    }
}

impl Handler<List> for ResellerService {
    type Result = ResponseActFuture<Self, Result<Vec<ResellerConfig>, anyhow::Error>>;

    fn handle(&mut self, _: List, _: &mut Self::Context) -> Self::Result {
        let repo = self.repo.clone();
        Box::pin(
            async move {
                repo.list()
                    .await
                    .context("Unable to list reseller configurations")
            }
            .into_actor(self),
        )
    }
}

impl Handler<Update> for ResellerService {
    type Result = ResponseActFuture<Self, Result<(), anyhow::Error>>;

    fn handle(&mut self, Update(config): Update, _: &mut Self::Context) -> Self::Result {
        let repo = self.repo.clone();
        Box::pin(
            async move {
                repo.save(config)
                    .await
                    .context("Unable to save reseller configuration")
            }
            .into_actor(self),
        )
    }
}

impl Handler<Remove> for ResellerService {
    type Result = ResponseActFuture<Self, Result<(), anyhow::Error>>;

    fn handle(&mut self, Remove(id): Remove, _: &mut Self::Context) -> Self::Result {
        let repo = self.repo.clone();
        Box::pin(
            async move {
                repo.remove(&id)
                    .await
                    .context("Unable to remove reseller configuration")
            }
            .into_actor(self),
        )
    }
}
