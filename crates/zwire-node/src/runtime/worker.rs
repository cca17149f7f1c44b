// Copyright 2025 zwire Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use tokio::sync::oneshot;
use zwire_common::{Result, ZwireError};

use crate::runtime::{BoaHost, ContextId, OnCreateHook, ScriptHost};

const WORKER_STACK_SIZE: usize = 8 * 1024 * 1024;

enum Job {
    Exec {
        name: String,
        params: Value,
        reply: oneshot::Sender<Result<Value>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to an interpreter living on its own OS thread.
///
/// The `BoaHost` is created, used and dropped on that thread; callers only
/// exchange jobs and replies with it.
pub(crate) struct ScriptWorker {
    id: ContextId,
    jobs: mpsc::Sender<Job>,
    alive: AtomicBool,
}

impl ScriptWorker {
    /// Start the thread and wait until the interpreter has run `hook`.
    pub(crate) async fn spawn(id: ContextId, hook: Option<OnCreateHook>) -> Result<Self> {
        let (jobs_tx, jobs_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = oneshot::channel();

        std::thread::Builder::new()
            .name(format!("zwire-script-{}", id))
            .stack_size(WORKER_STACK_SIZE)
            .spawn(move || run(id, hook, jobs_rx, ready_tx))?;

        ready_rx
            .await
            .map_err(|_| ZwireError::Pool(format!("context {} exited during setup", id)))??;

        Ok(Self {
            id,
            jobs: jobs_tx,
            alive: AtomicBool::new(true),
        })
    }

    pub(crate) fn id(&self) -> ContextId {
        self.id
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    pub(crate) async fn exec(&self, name: &str, params: Value) -> Result<Value> {
        let (reply, response) = oneshot::channel();
        let job = Job::Exec {
            name: name.to_string(),
            params,
            reply,
        };

        if self.jobs.send(job).is_err() {
            return Err(self.gone());
        }
        response.await.map_err(|_| self.gone())?
    }

    /// Ask the thread to drop its interpreter and exit.
    pub(crate) async fn shutdown(&self) -> Result<()> {
        let (reply, done) = oneshot::channel();
        if self.jobs.send(Job::Shutdown { reply }).is_err() {
            return Err(self.gone());
        }
        done.await.map_err(|_| self.gone())?;
        self.alive.store(false, Ordering::Release);
        Ok(())
    }

    fn gone(&self) -> ZwireError {
        self.alive.store(false, Ordering::Release);
        ZwireError::Pool(format!("context {} terminated", self.id))
    }
}

fn run(
    id: ContextId,
    hook: Option<OnCreateHook>,
    jobs: mpsc::Receiver<Job>,
    ready: oneshot::Sender<Result<()>>,
) {
    let mut host = match BoaHost::new() {
        Ok(host) => host,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    if let Some(hook) = hook {
        if let Err(e) = hook(&mut host as &mut dyn ScriptHost) {
            let _ = ready.send(Err(e));
            return;
        }
    }

    if ready.send(Ok(())).is_err() {
        return;
    }
    tracing::debug!(context = id, "Script context ready");

    while let Ok(job) = jobs.recv() {
        match job {
            Job::Exec {
                name,
                params,
                reply,
            } => {
                let result = host.call(&name, params);
                let _ = reply.send(result);
            }
            Job::Shutdown { reply } => {
                drop(host);
                let _ = reply.send(());
                tracing::debug!(context = id, "Script context stopped");
                return;
            }
        }
    }
}
